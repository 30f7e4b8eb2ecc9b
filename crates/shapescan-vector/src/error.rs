use crate::format::VectorFormat;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum VectorizeError {
    #[error("invalid vectorizer parameters: {0}")]
    InvalidParams(String),
    #[error("geometry has no paths")]
    Empty,
    #[error("ring {ring} is invalid: {reason}")]
    InvalidRing { ring: usize, reason: &'static str },
}

/// Failures while serializing or parsing vector documents.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{format} document is malformed: {message}")]
    Parse {
        format: VectorFormat,
        message: String,
    },
    #[error("{format} document contains no closed paths")]
    Empty { format: VectorFormat },
    #[error("geometry contains a non-finite coordinate")]
    NonFinite,
    #[error(transparent)]
    Geometry(#[from] VectorizeError),
}

impl ExportError {
    pub(crate) fn parse(format: VectorFormat, message: impl Into<String>) -> Self {
        Self::Parse {
            format,
            message: message.into(),
        }
    }
}
