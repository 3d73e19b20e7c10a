//! Error accumulation for conversions

use std::fmt;

/// Collects conversion errors
///
/// `errors` decide the outcome: a conversion that leaves any behind produces
/// no value. `cleanup_errors` record failed best-effort cleanup (e.g. removing
/// a remote blob after it was retrieved) and never invalidate a result.
#[derive(Debug, Clone, Default)]
pub struct ErrorSink {
    errors: Vec<String>,
    cleanup_errors: Vec<String>,
}

impl ErrorSink {
    /// Create empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error
    pub fn add(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Record a failed cleanup step
    pub fn add_cleanup(&mut self, message: impl Into<String>) {
        self.cleanup_errors.push(message.into());
    }

    /// No errors recorded (cleanup failures are not counted)
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Recorded errors
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Recorded cleanup failures
    pub fn cleanup_errors(&self) -> &[String] {
        &self.cleanup_errors
    }

    /// All errors joined into a single message, `None` when empty
    pub fn to_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join("\n"))
        }
    }
}

impl fmt::Display for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.errors.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_errors_do_not_count() {
        let mut sink = ErrorSink::new();
        sink.add_cleanup("could not remove");
        assert!(sink.is_empty());
        assert_eq!(sink.cleanup_errors().len(), 1);
        assert!(sink.to_message().is_none());

        sink.add("first");
        sink.add("second");
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.to_message().unwrap(), "first\nsecond");
    }
}
