//! ICP collaborator surface.
//!
//! The decider treats scan alignment as a black box: two scans in, a
//! relative-pose constraint and a goodness score out. [`IcpSolver`] is the
//! seam a concrete solver plugs into; [`IcpConfig`] is the `ICP`
//! configuration section forwarded to it on every call.

use serde::Deserialize;

use crate::core::types::{LaserScan2D, Pose2D, Pose3D, RangeScan3D};

/// Parameters forwarded to the ICP solver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IcpConfig {
    /// Maximum number of iterations.
    pub max_iterations: u32,

    /// Convergence threshold for translation (meters).
    pub translation_epsilon: f32,

    /// Convergence threshold for rotation (radians).
    pub rotation_epsilon: f32,

    /// Point pairs farther apart than this are rejected as outliers (meters).
    pub max_correspondence_distance: f32,

    /// Minimum number of valid correspondences for a usable alignment.
    pub min_correspondences: usize,

    /// Fraction of the worst correspondences to discard each iteration.
    pub outlier_ratio: f32,
}

impl Default for IcpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            translation_epsilon: 0.001,
            rotation_epsilon: 0.001,
            max_correspondence_distance: 0.5,
            min_correspondences: 10,
            outlier_ratio: 0.1,
        }
    }
}

/// What an alignment produced: the relative pose taking the reference scan's
/// frame into the current scan's frame, and a quality score.
#[derive(Debug, Clone, Copy)]
pub struct IcpSummary {
    /// Relative-pose constraint between the two scan poses.
    pub relative_pose: Pose3D,

    /// Alignment quality in [0, 1]; higher is better.
    pub goodness: f32,
}

impl IcpSummary {
    pub fn new(relative_pose: Pose3D, goodness: f32) -> Self {
        Self {
            relative_pose,
            goodness,
        }
    }

    /// An alignment that found nothing.
    pub fn failed() -> Self {
        Self {
            relative_pose: Pose3D::identity(),
            goodness: 0.0,
        }
    }
}

/// Black-box scan alignment service.
pub trait IcpSolver {
    /// Align two planar scans.
    fn align_laser_scans(
        &mut self,
        config: &IcpConfig,
        reference: &LaserScan2D,
        current: &LaserScan2D,
        initial_estimate: Option<Pose2D>,
    ) -> IcpSummary;

    /// Align two 3D range scans.
    fn align_range_scans(
        &mut self,
        config: &IcpConfig,
        reference: &RangeScan3D,
        current: &RangeScan3D,
        initial_estimate: Option<Pose3D>,
    ) -> IcpSummary;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = IcpConfig::default();
        assert!(config.max_iterations > 0);
        assert!(config.translation_epsilon > 0.0);
        assert!(config.max_correspondence_distance > 0.0);
        assert!(config.outlier_ratio < 1.0);
    }

    #[test]
    fn test_config_section_with_partial_keys() {
        let section: IcpConfig = toml::from_str(
            r#"
            max_iterations = 80
            max_correspondence_distance = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(section.max_iterations, 80);
        assert_eq!(section.max_correspondence_distance, 1.5);
        // Untouched keys keep their defaults
        assert_eq!(section.min_correspondences, 10);
    }

    #[test]
    fn test_failed_summary() {
        let summary = IcpSummary::failed();
        assert_eq!(summary.goodness, 0.0);
        assert_eq!(summary.relative_pose, Pose3D::identity());
    }
}
