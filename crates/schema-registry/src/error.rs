use stream_retry::RetryExhausted;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema registry connection error: {0}")]
    Connection(String),

    #[error("Schema registry request failed with status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to register schema under subject '{subject}': {message}")]
    Registration { subject: String, message: String },

    #[error("Schema lookup failed: {0}")]
    Lookup(String),

    #[error("Failed to read schema from {source_name}: {message}")]
    SchemaSource {
        source_name: String,
        message: String,
    },

    #[error("Invalid Avro schema: {0}")]
    InvalidSchema(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid serde configuration: {0}")]
    InvalidConfig(String),

    #[error("Schema registry client is closed")]
    Closed,

    #[error("{operation} failed")]
    Exhausted {
        operation: String,
        #[source]
        source: Box<RetryExhausted<Error>>,
    },
}

impl Error {
    pub(crate) fn exhausted(operation: impl Into<String>, source: RetryExhausted<Error>) -> Self {
        Error::Exhausted {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// The error of the last attempt when this is a retry exhaustion, otherwise `self`.
    pub fn root(&self) -> &Error {
        match self {
            Error::Exhausted { source, .. } => source.last_error.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
