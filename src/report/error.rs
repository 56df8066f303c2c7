use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unknown report kind: {0:?}. Expected weekly-training (wt), training (t) or phishing (p)")]
    UnknownReportKind(String),

    #[error("unknown frequency: {0:?}. Expected week, month, quarter or year")]
    UnknownFrequency(String),

    #[error("report kind {0} requires a frequency (week, month, quarter or year)")]
    MissingFrequency(&'static str),

    #[error("{operation} failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("{entity} {name:?} has an unparseable {field}: {value:?}")]
    InvalidTimestamp {
        entity: &'static str,
        name: String,
        field: &'static str,
        value: String,
    },
}

impl ReportError {
    pub fn transport(operation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            operation: operation.into(),
            source: source.into(),
        }
    }
}

/// Problem with a single fetched enrollment, recipient or user. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("malformed {entity}: {reason}")]
    Malformed { entity: &'static str, reason: String },
}

pub type Result<T, E = ReportError> = std::result::Result<T, E>;
