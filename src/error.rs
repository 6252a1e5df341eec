use crate::time::TfTime;
use compact_str::CompactString;
use thiserror::Error;

/// Default capacity of the bounded diagnostic messages handed across the
/// narrow boundary (see [`TfError::bounded_message`]).
pub const MAX_DIAGNOSTIC_LEN: usize = 255;

#[derive(Error, Debug)]
pub enum TfError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("frame '{0}' does not exist")]
    UnknownFrame(String),

    // thiserror reserves a field named `source` for error chaining
    #[error("frames '{target}' and '{source_frame}' are not connected (disjoint trees)")]
    Disconnected {
        target: String,
        source_frame: String,
    },

    #[error(
        "time {requested} is outside the history [{earliest}, {latest}] of edge '{parent}' -> '{child}'"
    )]
    TimeOutOfRange {
        requested: TfTime,
        earliest: TfTime,
        latest: TfTime,
        parent: String,
        child: String,
    },

    #[error(
        "transform at {stamp} from authority '{authority}' is older than the newest sample {newest} on edge '{parent}' -> '{child}'"
    )]
    OrderingViolation {
        stamp: TfTime,
        newest: TfTime,
        parent: String,
        child: String,
        authority: CompactString,
    },

    #[error("adding edge '{parent}' -> '{child}' would create a cycle in the transform tree")]
    CyclicTransformTree { parent: String, child: String },
}

pub type TfResult<T> = Result<T, TfError>;

/// Discriminated error code for the narrow call boundary. The code plus a
/// bounded UTF-8 message is all that crosses into a different runtime domain;
/// binding layers translate it into whatever their environment speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TfErrorCode {
    InvalidArgument = 1,
    UnknownFrame = 2,
    Disconnected = 3,
    TimeOutOfRange = 4,
    OrderingViolation = 5,
}

impl TfError {
    pub fn code(&self) -> TfErrorCode {
        match self {
            TfError::InvalidArgument(_) => TfErrorCode::InvalidArgument,
            TfError::UnknownFrame(_) => TfErrorCode::UnknownFrame,
            TfError::Disconnected { .. } => TfErrorCode::Disconnected,
            TfError::TimeOutOfRange { .. } => TfErrorCode::TimeOutOfRange,
            TfError::OrderingViolation { .. } => TfErrorCode::OrderingViolation,
            // A cycle is a malformed insertion request.
            TfError::CyclicTransformTree { .. } => TfErrorCode::InvalidArgument,
        }
    }

    /// Renders the error as a human-readable message of at most `cap` bytes,
    /// truncated on a char boundary.
    pub fn bounded_message(&self, cap: usize) -> String {
        let mut msg = self.to_string();
        if msg.len() > cap {
            let mut end = cap;
            while !msg.is_char_boundary(end) {
                end -= 1;
            }
            msg.truncate(end);
        }
        msg
    }
}
