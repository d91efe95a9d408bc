//! Diagnostics: the only way errors leave the core. Nothing in the
//! normalization pipeline panics or returns `Result::Err` for user-data
//! shaped problems — they're collected here instead (§7: "errors are never
//! thrown out of the core pipeline").

use crate::draft::{BlockId, EdgeId, PortRef};
use core::fmt;

#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum Severity {
    Info,
    Warn,
    Error,
    Fatal,
}

/// Classification computed from the offending constraint group's origins,
/// per §4.5: any `edge` origin outranks a `payloadMetadata` origin, which
/// outranks everything else.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum ErrorClass {
    UserPatchTypeError,
    BlockDefTooSpecific,
    Unresolved,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum DiagnosticCode {
    ConflictingPayloads,
    ConflictingUnits,
    PayloadNotInAllowedSet,
    EmptyAllowedSet,
    UnitlessMismatch,
    UnresolvedPayload,
    UnresolvedUnit,
    NoAdapter,
    NonConvergence,
    PayloadAnchorApplied,
}

impl DiagnosticCode {
    /// Stable string form, used as the key into
    /// `NormalizeConfig::severity_overrides`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::ConflictingPayloads => "ConflictingPayloads",
            DiagnosticCode::ConflictingUnits => "ConflictingUnits",
            DiagnosticCode::PayloadNotInAllowedSet => "PayloadNotInAllowedSet",
            DiagnosticCode::EmptyAllowedSet => "EmptyAllowedSet",
            DiagnosticCode::UnitlessMismatch => "UnitlessMismatch",
            DiagnosticCode::UnresolvedPayload => "UnresolvedPayload",
            DiagnosticCode::UnresolvedUnit => "UnresolvedUnit",
            DiagnosticCode::NoAdapter => "NoAdapter",
            DiagnosticCode::NonConvergence => "NonConvergence",
            DiagnosticCode::PayloadAnchorApplied => "PayloadAnchorApplied",
        }
    }

    /// Severity before any user override is applied.
    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticCode::PayloadAnchorApplied => Severity::Warn,
            DiagnosticCode::NonConvergence => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub port: Option<PortRef>,
    pub edge: Option<EdgeId>,
    pub block: Option<BlockId>,
    pub class: Option<ErrorClass>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: code.default_severity(),
            code,
            message: message.into(),
            port: None,
            edge: None,
            block: None,
            class: None,
        }
    }

    pub fn with_port(mut self, port: PortRef) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_edge(mut self, edge: EdgeId) -> Self {
        self.edge = Some(edge);
        self
    }

    pub fn with_block(mut self, block: BlockId) -> Self {
        self.block = Some(block);
        self
    }

    pub fn with_class(mut self, class: ErrorClass) -> Self {
        self.class = Some(class);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(port) = &self.port {
            write!(f, " (port {})", port.key())?;
        }
        Ok(())
    }
}
