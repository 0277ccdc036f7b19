//! SetuSLAM — edge registration and range simulation for 2D pose-graph SLAM.
//!
//! Two independent cores built on shared geometry primitives:
//!
//! - **Edge registration** ([`decider`]): an online component that watches a
//!   growing pose graph, keeps a node→scan registry, and registers ICP
//!   edges (including loop closures) between each new node and its
//!   geometric neighbors. The concrete ICP solver is a collaborator behind
//!   the [`matching::IcpSolver`] trait.
//! - **Range simulation** ([`grid`]): a ray marcher over a log-odds
//!   occupancy grid that synthesizes laser sweeps and sonar readings from a
//!   hypothetical sensor pose, with optional Gaussian noise.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 decider/                      │  ← edge registration
//! └───────────────────────────────────────────────┘
//!          │               │              │
//! ┌────────────────┐ ┌───────────┐ ┌─────────────┐
//! │    graph/      │ │ matching/ │ │    viz/     │  ← collaborator seams
//! └────────────────┘ └───────────┘ └─────────────┘
//!          │               │              │
//! ┌───────────────────────────────────────────────┐
//! │                  grid/                        │  ← occupancy + simulation
//! └───────────────────────────────────────────────┘
//!          │
//! ┌───────────────────────────────────────────────┐
//! │                  core/                        │  ← types, math
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Both cores assume a single driver thread; shared handles (graph,
//! display) are locked only for the duration of one mutation.

pub mod core;
pub mod decider;
pub mod error;
pub mod graph;
pub mod grid;
pub mod matching;
pub mod viz;

// Convenience re-exports (flat namespace for common use)

pub use crate::core::math;
pub use crate::core::types::{ActionCollection, Measurement, SensoryFrame};
pub use crate::core::types::{LaserScan2D, RangeImage, RangeScan3D, SonarRing, SonarTransducer};
pub use crate::core::types::{Pose2D, Pose3D};

pub use error::{Result, SetuError};

pub use graph::{GraphEdge, InMemoryGraph, NodeId, PoseGraph};

pub use grid::{
    l2p, p2l, CellValue, NoiseGenerator, OccupancyGrid, RangeSimulator, RangeSimulatorConfig,
};

pub use matching::{IcpConfig, IcpSolver, IcpSummary};

pub use decider::{
    DeciderParams, EdgeLabel, EdgeRegistrationDecider, LoadedConfig, VisualizationParams,
};

pub use viz::{new_display_handle, DisplayHandle, SceneGraph, SceneObject};
