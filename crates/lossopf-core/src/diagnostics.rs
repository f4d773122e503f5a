//! Issue collection for network validation.
//!
//! ```
//! use lossopf_core::diagnostics::Diagnostics;
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning("capacity", "Generation capacity below load");
//! diag.add_error_with_entity("topology", "Island has no slack bus", "Bus 4");
//! assert!(diag.has_errors());
//! assert_eq!(diag.warning_count(), 1);
//! ```

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Grouping key such as "topology", "reference", "parameter"
    pub category: String,
    pub message: String,
    /// Entity the issue is about (e.g. "Line 3", "Bus 2")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl DiagnosticIssue {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.add(DiagnosticIssue::new(Severity::Warning, category, message));
    }

    pub fn add_error(&mut self, category: &str, message: &str) {
        self.add(DiagnosticIssue::new(Severity::Error, category, message));
    }

    pub fn add_error_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.add(DiagnosticIssue::new(Severity::Error, category, message).with_entity(entity));
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Join all error messages into one line, for wrapping in a `CoreError`.
    pub fn error_summary(&self) -> String {
        self.errors()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_severity() {
        let mut diag = Diagnostics::new();
        diag.add_warning("capacity", "low");
        diag.add_error("topology", "no slack");
        diag.add_error_with_entity("parameter", "zero reactance", "Line 2");

        assert_eq!(diag.warning_count(), 1);
        assert_eq!(diag.error_count(), 2);
        assert!(diag.has_errors());
    }

    #[test]
    fn test_issue_display_includes_entity() {
        let issue = DiagnosticIssue::new(Severity::Error, "parameter", "zero reactance")
            .with_entity("Line 2");
        assert_eq!(issue.to_string(), "[error:parameter] zero reactance (Line 2)");
    }

    #[test]
    fn test_error_summary_skips_warnings() {
        let mut diag = Diagnostics::new();
        diag.add_warning("capacity", "low");
        diag.add_error("topology", "a");
        diag.add_error("topology", "b");
        assert_eq!(diag.error_summary(), "[error:topology] a; [error:topology] b");
    }

    #[test]
    fn test_serializes_without_empty_issues() {
        let json = serde_json::to_string(&Diagnostics::new()).unwrap();
        assert_eq!(json, "{}");
    }
}
