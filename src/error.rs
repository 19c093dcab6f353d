//! Error types for the deadwood pipeline

use derive_more::{Display, Error, From};
use deadwood_ir::{ParseError, ValidationResult};

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Display, Debug)]
#[display("{kind}")]
pub struct PipelineError {
    kind: Box<PipelineErrorKind>,
}

impl<E> From<E> for PipelineError
where
    PipelineErrorKind: From<E>,
{
    fn from(error: E) -> Self {
        PipelineError {
            kind: Box::new(PipelineErrorKind::from(error)),
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> &PipelineErrorKind {
        &self.kind
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

#[derive(Display, Debug, Error, From)]
pub enum PipelineErrorKind {
    #[display("I/O error: {_0}")]
    Io(std::io::Error),

    #[display("{_0}")]
    Parse(ParseError),

    #[display("{_0}")]
    Validation(ValidationResult),
}
