pub type AdapterResult<T> = Result<T, AdapterError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Other(String),
}
