use qbx_middle::parser::statement::JumpTarget;
use qbx_middle::sourcemap::Span;
use thiserror::Error;

use crate::graph::ShapeError;

/// A fatal error that aborts the build of one routine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("undefined line number or label {target} at {span}")]
    UnresolvedLabel { target: JumpTarget, span: Span },
    #[error("line number or label {target} is defined more than once (again at {span})")]
    DuplicateLabel { target: JumpTarget, span: Span },
    #[error("malformed control flow at {span}: {reason}")]
    Structural { reason: String, span: Span },
    #[error("constructs nested {depth} levels deep at {span}, the limit is {limit}")]
    ConstructTooComplex { depth: usize, limit: usize, span: Span },
}

impl Error {
    pub fn structural(reason: impl Into<String>, span: Span) -> Self {
        Self::Structural {
            reason: reason.into(),
            span,
        }
    }

    pub fn from_shape(err: ShapeError, span: Span) -> Self {
        Self::structural(err.to_string(), span)
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnresolvedLabel { span, .. }
            | Self::DuplicateLabel { span, .. }
            | Self::Structural { span, .. }
            | Self::ConstructTooComplex { span, .. } => *span,
        }
    }
}
