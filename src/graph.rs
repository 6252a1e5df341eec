use crate::error::{TfError, TfResult};
use crate::history::TransformHistory;
use crate::time::TfDuration;
use crate::transform::StampedTransform;
use crate::FrameIdString;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;

/// One frame in the forest: its current parent and the transform history of
/// the edge connecting it to that parent. Roots carry no parent and an empty
/// history.
#[derive(Debug)]
pub(crate) struct FrameNode {
    pub(crate) parent: Option<FrameIdString>,
    pub(crate) history: TransformHistory,
}

/// The edge-chains connecting two frames through their nearest common
/// ancestor. Each chain lists the child frames of the edges from the NCA down
/// to the respective endpoint, in descent order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramePath {
    pub nca: FrameIdString,
    pub target_chain: Vec<FrameIdString>,
    pub source_chain: Vec<FrameIdString>,
}

/// Flat frame-name map with parent pointers, instead of an object graph with
/// back references. Frames form a forest; disjoint trees are allowed and
/// lookups across them fail at path resolution.
#[derive(Debug, Default)]
pub struct FrameGraph {
    pub(crate) frames: DashMap<FrameIdString, FrameNode>,
}

impl FrameGraph {
    pub fn new() -> Self {
        Self {
            frames: DashMap::new(),
        }
    }

    pub fn contains(&self, frame: &FrameIdString) -> bool {
        self.frames.contains_key(frame)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn parent_of(&self, frame: &FrameIdString) -> Option<FrameIdString> {
        self.frames.get(frame).and_then(|node| node.parent)
    }

    /// Registers `frame` as a root if it is not known yet.
    pub(crate) fn ensure_frame(&self, frame: FrameIdString) {
        if let Entry::Vacant(vacant) = self.frames.entry(frame) {
            vacant.insert(FrameNode {
                parent: None,
                history: TransformHistory::new(false, TfDuration::ZERO),
            });
        }
    }

    /// True when attaching `child` under `parent` would make `child` its own
    /// ancestor. Walks the parent chain upward from `parent`; the existing
    /// acyclicity invariant bounds the walk.
    pub(crate) fn would_create_cycle(&self, parent: &FrameIdString, child: &FrameIdString) -> bool {
        if self.parent_of(child) == Some(*parent) {
            // edge already exists, appending to it cannot form a cycle
            return false;
        }
        let mut current = *parent;
        loop {
            if current == *child {
                return true;
            }
            match self.parent_of(&current) {
                Some(up) => current = up,
                None => return false,
            }
        }
    }

    /// Appends a record to the child's edge history, creating the frame on
    /// first use. A record naming a different parent than the stored one
    /// re-roots the child: the old edge's history is discarded and a fresh
    /// history starts under the new parent.
    pub(crate) fn insert_edge(&self, tf: StampedTransform, max_age: TfDuration) -> TfResult<()> {
        match self.frames.entry(tf.child_frame) {
            Entry::Occupied(mut occupied) => {
                let node = occupied.get_mut();
                if node.parent != Some(tf.parent_frame) {
                    node.parent = Some(tf.parent_frame);
                    node.history = TransformHistory::new(tf.is_static, max_age);
                }
                node.history.push(tf)
            }
            Entry::Vacant(vacant) => {
                let mut node = FrameNode {
                    parent: Some(tf.parent_frame),
                    history: TransformHistory::new(tf.is_static, max_age),
                };
                node.history.push(tf)?;
                vacant.insert(node);
                Ok(())
            }
        }
    }

    /// Resolves the nearest common ancestor of `target` and `source` and the
    /// two edge-chains hanging off it. Purely structural: timestamps are never
    /// consulted, and the resolution is recomputed per lookup since new edges
    /// can appear at any time.
    pub fn resolve_path(
        &self,
        target: &FrameIdString,
        source: &FrameIdString,
    ) -> TfResult<FramePath> {
        if !self.contains(target) {
            return Err(TfError::UnknownFrame(target.to_string()));
        }
        if !self.contains(source) {
            return Err(TfError::UnknownFrame(source.to_string()));
        }

        // source-side chain up to its root, source itself at depth 0
        let mut source_up = vec![*source];
        let mut current = *source;
        while let Some(parent) = self.parent_of(&current) {
            source_up.push(parent);
            current = parent;
        }
        let source_depth: HashMap<FrameIdString, usize> = source_up
            .iter()
            .enumerate()
            .map(|(depth, frame)| (*frame, depth))
            .collect();

        // walk target-side upward until we hit a frame on the source chain
        let mut target_descent = Vec::new();
        let mut current = *target;
        let nca = loop {
            if source_depth.contains_key(&current) {
                break current;
            }
            target_descent.push(current);
            match self.parent_of(&current) {
                Some(parent) => current = parent,
                None => {
                    return Err(TfError::Disconnected {
                        target: target.to_string(),
                        source_frame: source.to_string(),
                    });
                }
            }
        };
        target_descent.reverse();

        let source_chain: Vec<FrameIdString> = source_up[..source_depth[&nca]]
            .iter()
            .rev()
            .copied()
            .collect();

        Ok(FramePath {
            nca,
            target_chain: target_descent,
            source_chain,
        })
    }
}
