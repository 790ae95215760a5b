/// Unified error type for the draw pipeline
/// Each variant corresponds to one failure class of a discrete user action
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DrawError {
    /// Upload could not be read as a table
    #[error("Dataset load error: {message}")]
    DatasetLoad {
        message: String,
        source_format: Option<String>,
    },

    /// Alias mapping table is unusable (recoverable: continue without aliases)
    #[error("Mapping format error: {message}")]
    MappingFormat {
        message: String,
    },

    /// Language model or transport failure while translating a condition
    #[error("Translation error: {message}")]
    Translation {
        message: String,
        cause: Option<String>,
    },

    /// Translated query was rejected or failed while evaluating
    #[error("Query execution error: {message}")]
    QueryExecution {
        message: String,
        query: Option<String>,
    },

    /// Requested winner count is outside 1..=candidates
    #[error("Invalid draw size: requested {requested}, available {available}")]
    InvalidDrawSize {
        requested: usize,
        available: usize,
    },

    /// Condition text is empty
    #[error("Invalid condition: {message}")]
    InvalidCondition {
        message: String,
    },

    /// Configuration file or value is invalid
    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    /// Delimited export failed
    #[error("Export error: {message}")]
    Export {
        message: String,
    },
}

impl DrawError {
    pub fn dataset_load(message: impl Into<String>) -> Self {
        Self::DatasetLoad {
            message: message.into(),
            source_format: None,
        }
    }

    pub fn dataset_load_with_format(message: impl Into<String>, format: impl Into<String>) -> Self {
        Self::DatasetLoad {
            message: message.into(),
            source_format: Some(format.into()),
        }
    }

    pub fn mapping_format(message: impl Into<String>) -> Self {
        Self::MappingFormat {
            message: message.into(),
        }
    }

    pub fn translation(message: impl Into<String>) -> Self {
        Self::Translation {
            message: message.into(),
            cause: None,
        }
    }

    pub fn translation_with_cause(message: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Translation {
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    pub fn query_execution(message: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: message.into(),
            query: None,
        }
    }

    pub fn invalid_draw_size(requested: usize, available: usize) -> Self {
        Self::InvalidDrawSize { requested, available }
    }

    pub fn invalid_condition(message: impl Into<String>) -> Self {
        Self::InvalidCondition {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn export(message: impl Into<String>) -> Self {
        Self::Export {
            message: message.into(),
        }
    }

    /// Attach the offending query text to an execution error
    pub fn with_query(mut self, query_text: impl Into<String>) -> Self {
        if let Self::QueryExecution { query, .. } = &mut self {
            *query = Some(query_text.into());
        }
        self
    }

    /// Only mapping problems let the pipeline carry on as if nothing was uploaded
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MappingFormat { .. })
    }

    /// Text shown to the operator at the action boundary
    pub fn user_message(&self) -> String {
        match self {
            Self::DatasetLoad { message, .. } => {
                format!("The uploaded file could not be read: {}", message)
            }
            Self::MappingFormat { message } => {
                format!("The alias mapping was ignored: {}", message)
            }
            Self::Translation { message, cause } => match cause {
                Some(cause) => format!("The condition could not be translated: {} ({})", message, cause),
                None => format!("The condition could not be translated: {}", message),
            },
            // Execution messages are actionable as-is ("unknown column X")
            Self::QueryExecution { message, .. } => format!("Query execution failed: {}", message),
            Self::InvalidDrawSize { requested, available } => format!(
                "Cannot draw {} winner(s) from {} candidate(s)",
                requested, available
            ),
            Self::InvalidCondition { message } => message.clone(),
            Self::Config { message } => format!("Invalid configuration: {}", message),
            Self::Export { message } => format!("Export failed: {}", message),
        }
    }
}

impl From<csv::Error> for DrawError {
    fn from(err: csv::Error) -> Self {
        Self::Export {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for DrawError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

/// Result type alias for pipeline operations
pub type DrawResult<T> = Result<T, DrawError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_mapping_errors_are_recoverable() {
        assert!(DrawError::mapping_format("one column").is_recoverable());
        assert!(!DrawError::query_execution("unknown column 'x'").is_recoverable());
        assert!(!DrawError::translation("timeout").is_recoverable());
    }

    #[test]
    fn test_execution_message_is_verbatim() {
        let err = DrawError::query_execution("Unknown column 'agee'").with_query("SELECT * FROM df WHERE agee > 1");
        assert!(err.user_message().ends_with("Unknown column 'agee'"));
        match err {
            DrawError::QueryExecution { query, .. } => {
                assert_eq!(query.as_deref(), Some("SELECT * FROM df WHERE agee > 1"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_draw_size_message() {
        let err = DrawError::invalid_draw_size(5, 2);
        assert_eq!(err.to_string(), "Invalid draw size: requested 5, available 2");
    }
}
