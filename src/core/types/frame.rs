//! Per-step dataset content: single measurements, sensory frames, and
//! the action collections that accompany them.

use std::sync::Arc;

use super::pose::Pose2D;
use super::scan::{LaserScan2D, RangeScan3D};

/// One observation, tagged by kind.
///
/// Dataset readers hand these to the decider one step at a time; dispatch
/// is an ordinary `match` on the variant.
#[derive(Debug, Clone)]
pub enum Measurement {
    /// A planar laser range scan.
    LaserScan2D(Arc<LaserScan2D>),
    /// A structured 3D range scan, possibly with unloaded payloads.
    RangeScan3D(Box<RangeScan3D>),
    /// An odometry reading (ignored by the edge registration decider).
    Odometry(Pose2D),
}

impl Measurement {
    /// Short human-readable kind tag for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Measurement::LaserScan2D(_) => "laser_scan_2d",
            Measurement::RangeScan3D(_) => "range_scan_3d",
            Measurement::Odometry(_) => "odometry",
        }
    }
}

/// All measurements observed in one dataset step.
#[derive(Debug, Clone, Default)]
pub struct SensoryFrame {
    pub measurements: Vec<Measurement>,
}

impl SensoryFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, measurement: Measurement) {
        self.measurements.push(measurement);
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// The first planar laser scan in the frame, if any.
    pub fn first_laser_scan_2d(&self) -> Option<Arc<LaserScan2D>> {
        self.measurements.iter().find_map(|m| match m {
            Measurement::LaserScan2D(scan) => Some(Arc::clone(scan)),
            _ => None,
        })
    }
}

/// The motion commands / odometry increments recorded for one step.
///
/// Carried through `update` for symmetry with the dataset format; the
/// decider itself never consumes it.
#[derive(Debug, Clone, Default)]
pub struct ActionCollection {
    pub motions: Vec<Pose2D>,
}

impl ActionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.motions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::pose::Pose3D;

    #[test]
    fn test_first_laser_scan_skips_other_kinds() {
        let mut frame = SensoryFrame::new();
        frame.push(Measurement::Odometry(Pose2D::new(0.1, 0.0, 0.0)));
        let scan = Arc::new(LaserScan2D::new(4, 1.0, true, 5.0, Pose3D::identity()));
        frame.push(Measurement::LaserScan2D(Arc::clone(&scan)));

        let found = frame.first_laser_scan_2d().unwrap();
        assert_eq!(found.ray_count(), 4);
    }

    #[test]
    fn test_first_laser_scan_on_empty_frame() {
        let frame = SensoryFrame::new();
        assert!(frame.first_laser_scan_2d().is_none());
    }

    #[test]
    fn test_kind_names() {
        let m = Measurement::Odometry(Pose2D::identity());
        assert_eq!(m.kind_name(), "odometry");
    }
}
