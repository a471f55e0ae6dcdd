use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("corpus contains no chunks")]
    CorpusEmpty,

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("retriever has not been initialized")]
    NotInitialized,

    #[error("lexical index failure: {0}")]
    Lexical(String),

    #[error("corpus could not be read: {0}")]
    Corpus(String),
}

impl Error {
    /// Wraps any embedder failure, keeping the full cause chain in the message.
    pub fn embedding_unavailable(err: impl std::fmt::Display) -> Self {
        Self::EmbeddingUnavailable(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
