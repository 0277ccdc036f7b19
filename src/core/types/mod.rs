//! Core data types: poses, range observations, and dataset frames.

mod frame;
mod pose;
mod scan;

pub use frame::{ActionCollection, Measurement, SensoryFrame};
pub use pose::{Pose2D, Pose3D};
pub use scan::{LaserScan2D, RangeImage, RangeScan3D, SonarRing, SonarTransducer};
