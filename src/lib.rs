//! An in-memory buffer of time-varying coordinate frame relationships.
//!
//! Producers report stamped parent/child transforms with [`TfBuffer::set_transform`];
//! consumers ask for the pose of one frame relative to another at a given time with
//! [`TfBuffer::lookup_transform`], even when the two frames are only connected through
//! a chain of intermediate frames whose samples arrived at different times.
//!
//! Example usage:
//!
//! ```
//! use tf_buffer::{StampedTransform, TfBuffer, TfTime, Transform};
//! use glam::{DQuat, DVec3};
//!
//! let buffer = TfBuffer::new();
//! let tf = StampedTransform::new(
//!     "world",
//!     "robot",
//!     TfTime::from_sec_nanos(1, 0),
//!     Transform::new(DVec3::new(1.0, 0.0, 0.0), DQuat::IDENTITY),
//!     "example",
//!     false,
//! )
//! .unwrap();
//! buffer.set_transform(tf).unwrap();
//!
//! let pose = buffer
//!     .lookup_transform("world", "robot", TfTime::from_sec_nanos(1, 0))
//!     .unwrap();
//! assert_eq!(pose.transform.translation.x, 1.0);
//! ```

pub mod buffer;
pub mod error;
pub mod graph;
pub mod history;
pub mod time;
pub mod transform;

use arrayvec::ArrayString;

/// Frame identifier strings
pub type FrameIdString = ArrayString<64>;

pub use buffer::{TfBuffer, DEFAULT_CACHE_DURATION};
pub use error::{TfError, TfErrorCode, TfResult, MAX_DIAGNOSTIC_LEN};
pub use graph::{FrameGraph, FramePath};
pub use history::TransformHistory;
pub use time::{TfDuration, TfTime, TfTimeRange};
pub use transform::{rotation_between, StampedTransform, Transform};

/// Validates and interns a frame name.
///
/// Frame names must be non-empty and at most 64 bytes.
pub(crate) fn frame_id(name: &str) -> TfResult<FrameIdString> {
    if name.is_empty() {
        return Err(TfError::InvalidArgument(
            "frame name must not be empty".to_string(),
        ));
    }
    FrameIdString::from(name).map_err(|_| {
        TfError::InvalidArgument(format!("frame name '{name}' is too long (max 64 bytes)"))
    })
}
