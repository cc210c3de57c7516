//! Error types shared by every stage of the pipeline.

use crate::types::Position;

pub type Result<T, E = SmtError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum SmtError {
    /// The decoder was asked to translate zero tokens.
    #[error("cannot decode an empty sentence")]
    EmptySentence,

    #[error("beam size must be at least 1")]
    InvalidBeamSize,

    /// A single-position span has no score and no default was supplied.
    #[error("argument not satisfied: no score for span ({start}, {end})")]
    ArgumentNotSatisfied { start: Position, end: Position },

    #[error("invalid argument: {arg}: {msg}")]
    InvalidArgument { arg: &'static str, msg: String },

    #[error("invalid format: {arg}: {msg}")]
    InvalidFormat { arg: &'static str, msg: String },

    #[error("mismatched {what}: {left} != {right}")]
    MismatchedLength {
        what: &'static str,
        left: usize,
        right: usize,
    },
}

impl SmtError {
    pub(crate) fn invalid_argument<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidArgument {
            arg,
            msg: msg.into(),
        }
    }

    pub(crate) fn invalid_format<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidFormat {
            arg,
            msg: msg.into(),
        }
    }
}
