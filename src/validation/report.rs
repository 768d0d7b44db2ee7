//! Integrity report types.
//!
//! A [`ValidationReport`] collects every issue found while auditing a store
//! so callers can print it, count it, or match on issue codes.

use std::fmt;

/// The result of auditing a store.
#[derive(Clone, Debug, Default)]
pub struct ValidationReport {
    /// Issues in the order they were found.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Number of broken invariants.
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Issues carrying `code`.
    pub fn with_code(&self, code: IssueCode) -> impl Iterator<Item = &ValidationIssue> + '_ {
        self.issues.iter().filter(move |i| i.code == code)
    }

    /// True when no invariant is broken. Warnings are allowed.
    pub fn is_ok(&self) -> bool {
        self.error_count() == 0
    }

    /// True when there are neither errors nor warnings.
    pub fn is_ok_strict(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return writeln!(f, "Integrity check passed: no issues found");
        }

        writeln!(
            f,
            "Integrity check found {} error(s) and {} warning(s):",
            self.error_count(),
            self.warning_count()
        )?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

/// One integrity issue.
#[derive(Clone, Debug)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
    pub context: IssueContext,
}

impl ValidationIssue {
    /// Builds an error-level issue.
    pub fn error(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            context,
        }
    }

    /// Builds a warning-level issue.
    pub fn warning(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            context,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN ",
        };
        write!(f, "[{}] {:?} in {}: {}", tag, self.code, self.context, self.message)
    }
}

/// How serious an issue is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Allowed by the store but usually unintended.
    Warning,
    /// A broken store invariant.
    Error,
}

/// A stable code identifying the type of integrity issue.
///
/// These codes can be used for filtering, ignoring specific issues,
/// or programmatic handling of validation results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IssueCode {
    // Link issues
    /// An entry lists an observable id that is not live.
    DanglingObservableRef,
    /// An entry lists the same observable id more than once.
    DuplicateObservableRef,
    /// An observable's owning entry is not live.
    OrphanObservable,
    /// An observable and its entry disagree about ownership.
    OwnershipMismatch,

    // Counter issues
    /// A record idx is not below the store's counter for its kind.
    IdxBeyondCounter,

    // Content issues
    /// An entry owns no observable.
    ChildlessEntry,
    /// A record lacks an attribute the store requires.
    MissingRequiredAttribute,
}

/// Context about where a validation issue occurred.
#[derive(Clone, Debug)]
pub enum IssueContext {
    /// Issue with a specific entry.
    Entry { id: u64 },
    /// Issue with a specific observable.
    Observable { id: u64 },
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueContext::Entry { id } => write!(f, "entry {}", id),
            IssueContext::Observable { id } => write!(f, "observable {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_display() {
        let mut report = ValidationReport::new();
        assert!(report.is_ok_strict());
        assert_eq!(report.to_string(), "Integrity check passed: no issues found\n");

        report.add(ValidationIssue::warning(
            IssueCode::ChildlessEntry,
            "Entry owns no observable",
            IssueContext::Entry { id: 2 },
        ));
        assert!(report.is_ok());
        assert!(!report.is_ok_strict());

        report.add(ValidationIssue::error(
            IssueCode::OrphanObservable,
            "Owner entry 9 is not live",
            IssueContext::Observable { id: 4 },
        ));
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.with_code(IssueCode::OrphanObservable).count(), 1);

        let text = report.to_string();
        assert!(text.contains("1 error(s) and 1 warning(s)"));
        assert!(text.contains("[ERROR] OrphanObservable in observable 4"));
    }
}
