use thiserror::Error;

pub type SourceResult<T> = Result<T, SourceError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("invalid component identifier '{identifier}': must start uppercase and contain only alphanumerics or underscores")]
    InvalidIdentifier { identifier: String },

    #[error("empty source: nothing left after normalization")]
    EmptySource,
}
