use crate::error::{TfError, TfResult};
use crate::time::{TfDuration, TfTime, TfTimeRange};
use crate::transform::{StampedTransform, Transform};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Time-ordered series of transforms for a single parent/child edge.
///
/// A dynamic history accepts samples in non-decreasing timestamp order and
/// evicts samples older than the retention horizon relative to the newest one.
/// A static history holds exactly one logical entry that answers every
/// timestamp; re-setting it replaces the value going forward.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransformHistory {
    records: VecDeque<StampedTransform>,
    is_static: bool,
    max_age: TfDuration,
}

impl TransformHistory {
    pub fn new(is_static: bool, max_age: TfDuration) -> Self {
        Self {
            records: VecDeque::new(),
            is_static,
            max_age,
        }
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The closed interval covered by the stored samples.
    pub fn time_range(&self) -> Option<TfTimeRange> {
        Some(TfTimeRange {
            start: self.records.front()?.stamp,
            end: self.records.back()?.stamp,
        })
    }

    pub fn newest_stamp(&self) -> Option<TfTime> {
        self.records.back().map(|r| r.stamp)
    }

    /// Appends a record. All checks run before any mutation, so a rejected
    /// insertion leaves the history untouched.
    pub fn push(&mut self, tf: StampedTransform) -> TfResult<()> {
        if tf.stamp == TfTime::OUT_OF_RANGE {
            return Err(TfError::InvalidArgument(format!(
                "transform on '{}' -> '{}' carries an unrepresentable timestamp",
                tf.parent_frame, tf.child_frame
            )));
        }
        if tf.is_static != self.is_static {
            return Err(TfError::InvalidArgument(format!(
                "edge '{}' -> '{}' was created {} and cannot accept a {} transform",
                tf.parent_frame,
                tf.child_frame,
                if self.is_static { "static" } else { "dynamic" },
                if tf.is_static { "static" } else { "dynamic" },
            )));
        }

        if self.is_static {
            self.records.clear();
            self.records.push_back(tf);
            return Ok(());
        }

        if let Some(newest) = self.newest_stamp() {
            if tf.stamp < newest {
                warn!(
                    "rejecting out-of-order transform on '{}' -> '{}' from authority '{}': {} < {}",
                    tf.parent_frame, tf.child_frame, tf.authority, tf.stamp, newest
                );
                return Err(TfError::OrderingViolation {
                    stamp: tf.stamp,
                    newest,
                    parent: tf.parent_frame.to_string(),
                    child: tf.child_frame.to_string(),
                    authority: tf.authority,
                });
            }
        }

        self.records.push_back(tf);
        self.evict_expired();
        Ok(())
    }

    fn evict_expired(&mut self) {
        let Some(newest) = self.newest_stamp() else {
            return;
        };
        let horizon = TfDuration(newest.0.saturating_sub(self.max_age.0));
        let mut evicted = 0usize;
        while matches!(self.records.front(), Some(front) if front.stamp < horizon) {
            self.records.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            debug!(
                "evicted {evicted} transform(s) older than {horizon} from edge history (newest {newest})"
            );
        }
    }

    /// The transform value at `time`: the stored sample on an exact stamp
    /// match, otherwise the interpolation of the two straddling samples.
    /// Requests outside the retained interval of a dynamic history fail with
    /// `TimeOutOfRange`; a static history answers any time.
    pub fn value_at(&self, time: TfTime) -> TfResult<Transform> {
        if self.is_static {
            // set_transform never leaves a created history empty
            return self
                .records
                .front()
                .map(|r| r.transform)
                .ok_or_else(|| self.out_of_range(time));
        }

        let (Some(front), Some(back)) = (self.records.front(), self.records.back()) else {
            return Err(self.out_of_range(time));
        };
        if time < front.stamp || time > back.stamp {
            return Err(self.out_of_range(time));
        }

        let pos = self.records.partition_point(|r| r.stamp <= time);
        // pos > 0 since time >= front.stamp
        let before = &self.records[pos - 1];
        if before.stamp == time {
            return Ok(before.transform);
        }
        let after = &self.records[pos];

        let span = (after.stamp.0 - before.stamp.0) as f64;
        let ratio = (time.0 - before.stamp.0) as f64 / span;
        Ok(before.transform.interpolate(&after.transform, ratio))
    }

    fn out_of_range(&self, requested: TfTime) -> TfError {
        let range = self.time_range().unwrap_or(TfTimeRange {
            start: TfTime::ZERO,
            end: TfTime::ZERO,
        });
        let (parent, child) = self
            .records
            .front()
            .map(|r| (r.parent_frame.to_string(), r.child_frame.to_string()))
            .unwrap_or_default();
        TfError::TimeOutOfRange {
            requested,
            earliest: range.start,
            latest: range.end,
            parent,
            child,
        }
    }
}
