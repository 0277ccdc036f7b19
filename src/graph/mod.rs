//! Pose-graph access surface.
//!
//! The edge registration decider only needs five operations from whatever
//! graph backend the driver runs: node count, per-node pose, pairwise
//! translational distance, node enumeration, and edge insertion.
//! [`PoseGraph`] captures exactly that seam; [`InMemoryGraph`] is a plain
//! vector-backed implementation for drivers and tests that do not bring
//! their own backend.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::types::Pose3D;

/// Monotonically assigned node identifier.
pub type NodeId = u64;

/// Minimal graph interface consumed by the edge registration decider.
pub trait PoseGraph {
    /// Number of live nodes; strictly non-decreasing.
    fn node_count(&self) -> usize;

    /// Pose estimate of a node.
    fn node_pose(&self, id: NodeId) -> Option<Pose3D>;

    /// Euclidean translational distance between two node poses.
    fn distance_between(&self, a: NodeId, b: NodeId) -> Option<f32> {
        Some(self.node_pose(a)?.distance_to(&self.node_pose(b)?))
    }

    /// Snapshot all node ids into `out`.
    fn collect_node_ids(&self, out: &mut BTreeSet<NodeId>);

    /// Append an edge carrying a relative-pose constraint. Duplicate edges
    /// are the backend's business; no deduplication is expected here.
    fn insert_edge(&mut self, from: NodeId, to: NodeId, constraint: Pose3D);
}

/// A relative-pose constraint between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub constraint: Pose3D,
}

/// Vector-backed pose graph.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    nodes: Vec<Pose3D>,
    edges: Vec<GraphEdge>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, returning its id.
    pub fn add_node(&mut self, pose: Pose3D) -> NodeId {
        self.nodes.push(pose);
        (self.nodes.len() - 1) as NodeId
    }

    /// Update a node's pose estimate.
    pub fn set_node_pose(&mut self, id: NodeId, pose: Pose3D) {
        if let Some(slot) = self.nodes.get_mut(id as usize) {
            *slot = pose;
        }
    }

    pub fn nodes(&self) -> &[Pose3D] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }
}

impl PoseGraph for InMemoryGraph {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_pose(&self, id: NodeId) -> Option<Pose3D> {
        self.nodes.get(id as usize).copied()
    }

    fn collect_node_ids(&self, out: &mut BTreeSet<NodeId>) {
        out.extend(0..self.nodes.len() as NodeId);
    }

    fn insert_edge(&mut self, from: NodeId, to: NodeId, constraint: Pose3D) {
        self.edges.push(GraphEdge {
            from,
            to,
            constraint,
        });
    }
}
