use serde::{Deserialize, Serialize};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A whole mesh, submesh or skeleton record was dropped.
    Error,
    /// Output was degraded (lost shape, lost weight) but kept.
    Warning,
    Info,
}

/// A single finding produced while converting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable code for the rule that fired (e.g. "NOT_TRIANGULATED").
    pub code: String,
    pub message: String,
    pub severity: Severity,
    /// Node, shape or submesh the finding is about.
    pub scope: String,
}

/// Everything that was rejected or degraded during one conversion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionReport {
    pub items: Vec<Diagnostic>,
    pub error_count: u32,
    pub warning_count: u32,
    pub info_count: u32,
}

impl ConversionReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic, update counts and mirror it to the log.
    pub fn add(&mut self, item: Diagnostic) {
        match item.severity {
            Severity::Error => {
                log::warn!("[{}] {}: {}", item.code, item.scope, item.message);
                self.error_count += 1;
            }
            Severity::Warning => {
                log::warn!("[{}] {}: {}", item.code, item.scope, item.message);
                self.warning_count += 1;
            }
            Severity::Info => {
                log::info!("[{}] {}: {}", item.code, item.scope, item.message);
                self.info_count += 1;
            }
        }
        self.items.push(item);
    }

    pub fn error(&mut self, code: &str, scope: impl Into<String>, message: impl Into<String>) {
        self.push(code, Severity::Error, scope, message);
    }

    pub fn warning(&mut self, code: &str, scope: impl Into<String>, message: impl Into<String>) {
        self.push(code, Severity::Warning, scope, message);
    }

    pub fn info(&mut self, code: &str, scope: impl Into<String>, message: impl Into<String>) {
        self.push(code, Severity::Info, scope, message);
    }

    fn push(
        &mut self,
        code: &str,
        severity: Severity,
        scope: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.add(Diagnostic {
            code: code.to_string(),
            message: message.into(),
            severity,
            scope: scope.into(),
        });
    }

    /// Merge another report into this one.
    pub fn merge(&mut self, other: ConversionReport) {
        for item in other.items {
            self.add(item);
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.items.iter().any(|item| item.code == code)
    }

    pub fn count_code(&self, code: &str) -> usize {
        self.items.iter().filter(|item| item.code == code).count()
    }

    pub fn is_clean(&self) -> bool {
        self.error_count == 0 && self.warning_count == 0
    }
}
