//! `NormalizeConfig` — the options a caller passes into [`crate::compile`].
//! Plain in-memory data; the core does no file or environment I/O, so there
//! is no config-loading layer here. The editor process is where a
//! `NormalizeConfig` would be assembled from whatever settings UI or config
//! file it owns.

use crate::diagnostics::Severity;
use rustc_hash::FxHashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizeConfig {
    /// Fixpoint iteration cap.
    pub max_iterations: u32,
    /// Emit a `log::debug!` breadcrumb per fixpoint iteration recording
    /// iteration index, obligation counts, and plans applied.
    pub trace: bool,
    /// Per-diagnostic-code severity override, applied before diagnostics
    /// are surfaced to the caller.
    pub severity_overrides: FxHashMap<&'static str, Severity>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig {
            max_iterations: 32,
            trace: false,
            severity_overrides: FxHashMap::default(),
        }
    }
}

impl NormalizeConfig {
    pub fn new() -> Self {
        NormalizeConfig::default()
    }

    /// Resolve the effective severity for a diagnostic code, falling back
    /// to `default_severity` when no override is configured.
    pub fn effective_severity(&self, code: &str, default_severity: Severity) -> Severity {
        self.severity_overrides
            .iter()
            .find(|(k, _)| **k == code)
            .map(|(_, v)| *v)
            .unwrap_or(default_severity)
    }
}
