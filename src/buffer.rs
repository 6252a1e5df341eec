use crate::error::{TfError, TfResult, MAX_DIAGNOSTIC_LEN};
use crate::graph::{FrameGraph, FramePath};
use crate::time::{TfDuration, TfTime};
use crate::transform::{StampedTransform, Transform};
use crate::{frame_id, FrameIdString};
use compact_str::CompactString;
use log::warn;
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Samples older than this, relative to the newest sample on the same edge,
/// are evicted on insertion.
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(10);

/// The transform tree buffer: per-edge time-indexed histories plus the frame
/// forest connecting them.
///
/// Producers append with [`TfBuffer::set_transform`]; consumers query with
/// [`TfBuffer::lookup_transform`] and friends. All operations are synchronous
/// and bounded by a tree walk plus a binary search per edge; the buffer is
/// `Send + Sync`, with mutation serialized per frame entry.
pub struct TfBuffer {
    graph: FrameGraph,
    cache_duration: TfDuration,
    // Serializes the cycle check against the insertion it guards. The two
    // touch different map entries, so the map's own sharding cannot order
    // them; without this, two racing inserts can each pass the check and
    // together close a cycle. Lookups stay on the concurrent map unlocked.
    write_lock: Mutex<()>,
}

impl TfBuffer {
    /// Creates a buffer with the default retention horizon.
    pub fn new() -> Self {
        Self::with_cache_duration(DEFAULT_CACHE_DURATION)
    }

    /// Creates a buffer retaining `cache_duration` of history per dynamic edge.
    pub fn with_cache_duration(cache_duration: Duration) -> Self {
        Self {
            graph: FrameGraph::new(),
            cache_duration: cache_duration.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn graph(&self) -> &FrameGraph {
        &self.graph
    }

    /// Appends a transform record, creating the frames and the edge on first
    /// use.
    ///
    /// The rotation quaternion is renormalized on ingestion; a near-zero norm
    /// is rejected as `InvalidArgument`. Other failure modes: self loop,
    /// cycle creation, static/dynamic flag flip on an existing edge, and an
    /// out-of-order timestamp on a dynamic edge (`OrderingViolation`). Every
    /// check runs before any mutation, so a failed call never leaves the
    /// buffer partially updated.
    pub fn set_transform(&self, tf: StampedTransform) -> TfResult<()> {
        if tf.parent_frame == tf.child_frame {
            return Err(TfError::InvalidArgument(format!(
                "cannot attach frame '{}' to itself",
                tf.child_frame
            )));
        }

        let mut tf = tf;
        tf.transform = tf.transform.renormalized().ok_or_else(|| {
            TfError::InvalidArgument(format!(
                "rotation quaternion on '{}' -> '{}' has near-zero norm and cannot be normalized",
                tf.parent_frame, tf.child_frame
            ))
        })?;

        // the guard carries no data, so a poisoned lock is still usable
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.graph.would_create_cycle(&tf.parent_frame, &tf.child_frame) {
            warn!(
                "rejecting transform from authority '{}': edge '{}' -> '{}' would close a cycle",
                tf.authority, tf.parent_frame, tf.child_frame
            );
            return Err(TfError::CyclicTransformTree {
                parent: tf.parent_frame.to_string(),
                child: tf.child_frame.to_string(),
            });
        }

        self.graph.ensure_frame(tf.parent_frame);
        self.graph.insert_edge(tf, self.cache_duration)
    }

    /// The pose of `source` expressed in `target` at `time`.
    ///
    /// [`TfTime::LATEST`] resolves to the most recent time available on every
    /// dynamic edge of the path. Per-edge values are exact on a stamp match
    /// and interpolated (linear translation, SLERP rotation) between the two
    /// straddling samples otherwise; dynamic edges never extrapolate. The
    /// result is stamped with the resolved time.
    pub fn lookup_transform(
        &self,
        target: &str,
        source: &str,
        time: TfTime,
    ) -> TfResult<StampedTransform> {
        let target_id = frame_id(target)?;
        let source_id = frame_id(source)?;

        if target_id == source_id {
            if !self.graph.contains(&target_id) {
                return Err(TfError::UnknownFrame(target.to_string()));
            }
            return Ok(Self::stamped_result(Transform::IDENTITY, time, target_id, source_id));
        }

        let path = self.graph.resolve_path(&target_id, &source_id)?;
        let effective = if time == TfTime::LATEST {
            self.latest_common_time_on(&path)?
        } else {
            time
        };

        let nca_to_target = self.compose_chain(&path.target_chain, effective)?;
        let nca_to_source = self.compose_chain(&path.source_chain, effective)?;
        let transform = nca_to_target.inverse() * nca_to_source;

        Ok(Self::stamped_result(transform, effective, target_id, source_id))
    }

    /// Time-bridged lookup: where was `source` at `source_time` relative to
    /// `target` at `target_time`, assuming `fixed` was motionless in between.
    ///
    /// Composes `source -> fixed` at `source_time` with `fixed -> target` at
    /// `target_time`; either half failing fails the whole call with that
    /// half's error. The result is stamped with the target-half resolved time.
    pub fn lookup_transform_full(
        &self,
        target: &str,
        target_time: TfTime,
        source: &str,
        source_time: TfTime,
        fixed: &str,
    ) -> TfResult<StampedTransform> {
        let fixed_to_source = self.lookup_transform(fixed, source, source_time)?;
        let target_to_fixed = self.lookup_transform(target, fixed, target_time)?;

        Ok(Self::stamped_result(
            target_to_fixed.transform * fixed_to_source.transform,
            target_to_fixed.stamp,
            target_to_fixed.parent_frame,
            fixed_to_source.child_frame,
        ))
    }

    /// Non-throwing probe for [`TfBuffer::lookup_transform`].
    ///
    /// Returns `(true, "")` when the lookup would succeed, and `(false, msg)`
    /// with a bounded human-readable description of the first failure
    /// otherwise. Only malformed arguments (empty or oversized frame names)
    /// surface as an error. Never mutates the buffer.
    pub fn can_transform(
        &self,
        target: &str,
        source: &str,
        time: TfTime,
    ) -> TfResult<(bool, String)> {
        Self::probe(self.lookup_transform(target, source, time))
    }

    /// Non-throwing probe for [`TfBuffer::lookup_transform_full`].
    pub fn can_transform_full(
        &self,
        target: &str,
        target_time: TfTime,
        source: &str,
        source_time: TfTime,
        fixed: &str,
    ) -> TfResult<(bool, String)> {
        Self::probe(self.lookup_transform_full(target, target_time, source, source_time, fixed))
    }

    /// The most recent time common to every dynamic edge on the path between
    /// the two frames. Static edges do not constrain the result; a path with
    /// only static edges yields [`TfTime::ZERO`].
    pub fn latest_common_time(&self, target: &str, source: &str) -> TfResult<TfTime> {
        let target_id = frame_id(target)?;
        let source_id = frame_id(source)?;
        if target_id == source_id {
            if !self.graph.contains(&target_id) {
                return Err(TfError::UnknownFrame(target.to_string()));
            }
            return Ok(TfTime::ZERO);
        }
        let path = self.graph.resolve_path(&target_id, &source_id)?;
        self.latest_common_time_on(&path)
    }

    /// A newline-separated listing of every linked frame and its parent, for
    /// diagnostics.
    pub fn all_frames_as_string(&self) -> String {
        let mut links: Vec<(FrameIdString, FrameIdString)> = self
            .graph
            .frames
            .iter()
            .filter_map(|entry| entry.value().parent.map(|parent| (*entry.key(), parent)))
            .collect();
        links.sort();

        let mut out = String::new();
        for (child, parent) in links {
            let _ = writeln!(out, "frame {child} exists with parent {parent}.");
        }
        out
    }

    fn probe(result: TfResult<StampedTransform>) -> TfResult<(bool, String)> {
        match result {
            Ok(_) => Ok((true, String::new())),
            Err(err @ TfError::InvalidArgument(_)) => Err(err),
            Err(err) => Ok((false, err.bounded_message(MAX_DIAGNOSTIC_LEN))),
        }
    }

    fn stamped_result(
        transform: Transform,
        stamp: TfTime,
        target: FrameIdString,
        source: FrameIdString,
    ) -> StampedTransform {
        StampedTransform {
            transform,
            stamp,
            parent_frame: target,
            child_frame: source,
            authority: CompactString::const_new(""),
            is_static: false,
        }
    }

    fn latest_common_time_on(&self, path: &FramePath) -> TfResult<TfTime> {
        let mut latest: Option<TfTime> = None;
        for child in path.target_chain.iter().chain(path.source_chain.iter()) {
            let node = self
                .graph
                .frames
                .get(child)
                .ok_or_else(|| TfError::UnknownFrame(child.to_string()))?;
            if node.history.is_static() {
                continue;
            }
            let newest = node
                .history
                .newest_stamp()
                .ok_or_else(|| TfError::UnknownFrame(child.to_string()))?;
            latest = Some(match latest {
                None => newest,
                Some(current) => current.min(newest),
            });
        }
        Ok(latest.unwrap_or(TfTime::ZERO))
    }

    /// Folds the edges of one NCA-down chain into a single transform at
    /// `time`. Each element of `chain` is the child frame of its edge.
    fn compose_chain(&self, chain: &[FrameIdString], time: TfTime) -> TfResult<Transform> {
        let mut acc = Transform::IDENTITY;
        for child in chain {
            let node = self
                .graph
                .frames
                .get(child)
                .ok_or_else(|| TfError::UnknownFrame(child.to_string()))?;
            let value = node.history.value_at(time)?;
            acc = acc * value;
        }
        Ok(acc)
    }
}

impl Default for TfBuffer {
    fn default() -> Self {
        Self::new()
    }
}
