//! Obligations: pending elaboration tasks the fixpoint driver discovers and
//! discharges via policies (§4.7).

use crate::draft::{EdgeId, PortRef};
use crate::facts::FactSet;
use core::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// What a fact-dependency requires of a port before an obligation's policy
/// may run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum FactDependency {
    PortCanonicalizable,
    PortPayloadResolved,
    PortUnitResolved,
    PortAxisResolved,
}

/// What an obligation is actually about.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Subject {
    Edge(EdgeId),
    Port(PortRef),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ObligationStatus {
    Open,
    Discharged,
    Blocked,
}

/// `(id, policyName, subject, dependencies, status)`. Ids are content
/// derived (§4.7: "stable across iterations so that reruns don't duplicate
/// work"), built from the policy name and subject so the same obligation
/// reappearing across iterations collapses to the same id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Obligation {
    pub id: String,
    pub policy_name: String,
    pub subject: Subject,
    pub dependencies: Vec<(PortRef, FactDependency)>,
    pub status: ObligationStatus,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Edge(e) => write!(f, "edge:{e}"),
            Subject::Port(p) => write!(f, "port:{}", p.key()),
        }
    }
}

impl Obligation {
    pub fn new(
        policy_name: impl Into<String>,
        subject: Subject,
        dependencies: Vec<(PortRef, FactDependency)>,
    ) -> Self {
        let policy_name = policy_name.into();
        let id = format!("{policy_name}:{subject}");
        Obligation {
            id,
            policy_name,
            subject,
            dependencies,
            status: ObligationStatus::Open,
        }
    }

    /// True once every fact-dependency is satisfied by `facts`.
    pub fn dependencies_satisfied(&self, facts: &FactSet) -> bool {
        self.dependencies.iter().all(|(port, dep)| match facts.ports.get(port) {
            Some(hint) => match dep {
                FactDependency::PortCanonicalizable => hint.is_ok(),
                FactDependency::PortPayloadResolved => hint.is_ok(),
                FactDependency::PortUnitResolved => hint.is_ok(),
                FactDependency::PortAxisResolved => hint.is_ok(),
            },
            None => false,
        })
    }
}
