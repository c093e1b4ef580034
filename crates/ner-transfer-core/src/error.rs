use thiserror::Error;

/// Errors that can occur while reading corpora or scoring annotations.
#[derive(Debug, Error)]
pub enum NerError {
    /// A record line did not split into exactly one token and one tag.
    #[error("malformed record on line {line}: {content:?} (expected TOKEN<TAB>TAG)")]
    Parse {
        /// 1-based line number within the input.
        line: usize,
        /// The offending line, as read.
        content: String,
    },

    /// The underlying reader or file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System and gold sequences differ in length under the strict policy.
    #[error("length mismatch: {system} system sentences vs {gold} gold sentences")]
    LengthMismatch {
        /// Number of system sentences.
        system: usize,
        /// Number of gold sentences.
        gold: usize,
    },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, NerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = NerError::Parse {
            line: 3,
            content: "Anders".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 3"));
        assert!(msg.contains("Anders"));

        let err = NerError::LengthMismatch { system: 2, gold: 3 };
        assert_eq!(
            err.to_string(),
            "length mismatch: 2 system sentences vs 3 gold sentences"
        );
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: NerError = io.into();
        assert!(matches!(err, NerError::Io(_)));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NerError>();
    }
}
