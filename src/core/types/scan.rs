//! Range observation types: planar laser scans, 3D range scans with
//! externally stored payloads, and sonar rings.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::pose::Pose3D;
use crate::error::{Result, SetuError};

/// A planar laser range scan.
///
/// Samples are ordered along the sweep; `valid[i]` tells whether `ranges[i]`
/// carries a real return. The sweep spans `aperture` radians centered on the
/// sensor heading, running right-to-left or left-to-right depending on
/// `right_to_left`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserScan2D {
    /// Total angular span of the sweep in radians.
    pub aperture: f32,
    /// Sweep direction: true = rightmost ray first.
    pub right_to_left: bool,
    /// Maximum measurable range in meters.
    pub max_range: f32,
    /// Sensor pose relative to the robot frame.
    pub sensor_pose: Pose3D,
    /// Range samples in meters.
    pub ranges: Vec<f32>,
    /// Per-sample validity flags.
    pub valid: Vec<bool>,
}

impl LaserScan2D {
    /// Create a scan of `ray_count` zeroed, invalid samples.
    pub fn new(
        ray_count: usize,
        aperture: f32,
        right_to_left: bool,
        max_range: f32,
        sensor_pose: Pose3D,
    ) -> Self {
        Self {
            aperture,
            right_to_left,
            max_range,
            sensor_pose,
            ranges: vec![0.0; ray_count],
            valid: vec![false; ray_count],
        }
    }

    /// Number of rays in the sweep.
    #[inline]
    pub fn ray_count(&self) -> usize {
        self.ranges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Sensor-frame angle of ray `i`.
    ///
    /// Ray 0 sits at ±aperture/2 depending on the sweep direction and the
    /// remaining rays are spaced evenly across the aperture.
    pub fn angle_of(&self, i: usize) -> f32 {
        let n = self.ray_count();
        debug_assert!(n >= 2);
        let half = if self.right_to_left { -0.5 } else { 0.5 };
        let sweep = if self.right_to_left { 1.0 } else { -1.0 };
        let step = sweep * self.aperture / (n - 1) as f32;
        half * self.aperture + i as f32 * step
    }

    /// Resize to `ray_count` samples, resetting every entry to
    /// range 0.0 / invalid.
    pub fn reset(&mut self, ray_count: usize) {
        self.ranges.clear();
        self.ranges.resize(ray_count, 0.0);
        self.valid.clear();
        self.valid.resize(ray_count, false);
    }

    /// Number of valid returns.
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }
}

impl Default for LaserScan2D {
    fn default() -> Self {
        Self {
            aperture: std::f32::consts::PI,
            right_to_left: true,
            max_range: 12.0,
            sensor_pose: Pose3D::identity(),
            ranges: Vec::new(),
            valid: Vec::new(),
        }
    }
}

/// Dense range image in meters, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl RangeImage {
    /// Build from row-major data; `data.len()` must equal `width * height`.
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), width * height, "range image dimension mismatch");
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    /// One full image row.
    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Read from the on-disk blob format: `u32 width, u32 height,
    /// width*height f32` samples, all little-endian.
    pub fn read_from(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;
        let width = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
        let height = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;

        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;
        if raw.len() != width * height * 4 {
            return Err(SetuError::Payload(format!(
                "range image {}: expected {} samples, found {} bytes",
                path.display(),
                width * height,
                raw.len()
            )));
        }

        let data = raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Write the on-disk blob format read by [`RangeImage::read_from`].
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(&(self.width as u32).to_le_bytes())?;
        file.write_all(&(self.height as u32).to_le_bytes())?;
        for sample in &self.data {
            file.write_all(&sample.to_le_bytes())?;
        }
        Ok(())
    }
}

/// A structured 3D range scan: a range image, an optional intensity image,
/// and external-storage paths the payloads can be lazily loaded from.
#[derive(Debug, Clone, Default)]
pub struct RangeScan3D {
    /// Sensor pose relative to the robot frame.
    pub sensor_pose: Pose3D,
    /// Maximum measurable range in meters.
    pub max_range: f32,
    /// Horizontal field of view in radians (used for the planar projection).
    pub horizontal_aperture: f32,
    /// Range image payload, if materialized.
    pub range_image: Option<RangeImage>,
    /// Intensity image payload, if materialized.
    pub intensity_image: Option<GrayImage>,
    /// External-storage path of the range image.
    pub range_path: Option<PathBuf>,
    /// External-storage path of the intensity image.
    pub intensity_path: Option<PathBuf>,
}

impl RangeScan3D {
    pub fn new(sensor_pose: Pose3D, max_range: f32, horizontal_aperture: f32) -> Self {
        Self {
            sensor_pose,
            max_range,
            horizontal_aperture,
            ..Default::default()
        }
    }

    /// Whether every externally referenced payload has been materialized.
    pub fn is_loaded(&self) -> bool {
        (self.range_path.is_none() || self.range_image.is_some())
            && (self.intensity_path.is_none() || self.intensity_image.is_some())
    }

    /// Materialize any payloads still living on disk. Already loaded
    /// payloads are kept as-is.
    pub fn load(&mut self) -> Result<()> {
        if self.range_image.is_none() {
            if let Some(path) = &self.range_path {
                self.range_image = Some(RangeImage::read_from(path)?);
            }
        }
        if self.intensity_image.is_none() {
            if let Some(path) = &self.intensity_path {
                self.intensity_image = Some(image::open(path)?.to_luma8());
            }
        }
        Ok(())
    }

    /// Rewrite the external-storage paths to point into `dir`, keeping the
    /// file names. Used when a dataset's image directory has moved.
    pub fn redirect_external_storage(&mut self, dir: &Path) {
        for path in [&mut self.range_path, &mut self.intensity_path]
            .into_iter()
            .flatten()
        {
            if let Some(name) = path.file_name() {
                *path = dir.join(name);
            }
        }
    }

    /// Synthesize a planar scan from the center row of the range image.
    ///
    /// Returns `None` when the range payload is absent or too narrow.
    pub fn project_to_2d(&self) -> Option<LaserScan2D> {
        let range_image = self.range_image.as_ref()?;
        if range_image.width() < 2 {
            return None;
        }

        let row = range_image.row(range_image.height() / 2);
        let mut scan = LaserScan2D::new(
            row.len(),
            self.horizontal_aperture,
            true,
            self.max_range,
            self.sensor_pose,
        );
        for (i, &r) in row.iter().enumerate() {
            scan.ranges[i] = r;
            scan.valid[i] = r.is_finite() && r > 0.0 && r <= self.max_range;
        }
        Some(scan)
    }
}

/// One sonar transducer: its mounting pose and the latest sensed distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SonarTransducer {
    /// Transducer pose relative to the robot frame.
    pub sensor_pose: Pose3D,
    /// Sensed distance in meters; 0 when nothing was detected.
    pub sensed_distance: f32,
}

impl SonarTransducer {
    pub fn new(sensor_pose: Pose3D) -> Self {
        Self {
            sensor_pose,
            sensed_distance: 0.0,
        }
    }
}

/// A ring of sonar transducers sharing one cone geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SonarRing {
    /// Smallest measurable distance in meters.
    pub min_sensor_distance: f32,
    /// Largest measurable distance in meters.
    pub max_sensor_distance: f32,
    /// Full cone aperture of each transducer in radians.
    pub cone_aperture: f32,
    pub transducers: Vec<SonarTransducer>,
}

impl SonarRing {
    pub fn new(cone_aperture: f32, max_sensor_distance: f32) -> Self {
        Self {
            min_sensor_distance: 0.0,
            max_sensor_distance,
            cone_aperture,
            transducers: Vec::new(),
        }
    }

    /// Add a transducer at the given robot-relative pose.
    pub fn push_transducer(&mut self, sensor_pose: Pose3D) {
        self.transducers.push(SonarTransducer::new(sensor_pose));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    #[test]
    fn test_scan_angles_right_to_left() {
        let scan = LaserScan2D::new(5, PI, true, 10.0, Pose3D::identity());
        assert_relative_eq!(scan.angle_of(0), -PI / 2.0, epsilon = 1e-6);
        assert_relative_eq!(scan.angle_of(4), PI / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_scan_angles_left_to_right() {
        let scan = LaserScan2D::new(5, PI, false, 10.0, Pose3D::identity());
        assert_relative_eq!(scan.angle_of(0), PI / 2.0, epsilon = 1e-6);
        assert_relative_eq!(scan.angle_of(4), -PI / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_scan_reset_clears_samples() {
        let mut scan = LaserScan2D::new(3, PI, true, 10.0, Pose3D::identity());
        scan.ranges[1] = 4.2;
        scan.valid[1] = true;

        scan.reset(6);

        assert_eq!(scan.ray_count(), 6);
        assert!(scan.ranges.iter().all(|&r| r == 0.0));
        assert_eq!(scan.valid_count(), 0);
    }

    #[test]
    fn test_range_image_blob_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth_000042.bin");

        let img = RangeImage::new(3, 2, vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0]);
        img.write_to(&path).unwrap();

        let back = RangeImage::read_from(&path).unwrap();
        assert_eq!(back, img);
        assert_relative_eq!(back.get(1, 2), 3.0);
    }

    #[test]
    fn test_scan3d_lazy_load_and_projection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depth_000001.bin");
        RangeImage::new(4, 3, vec![1.0; 12]).write_to(&path).unwrap();

        let mut scan = RangeScan3D::new(Pose3D::identity(), 5.0, PI / 3.0);
        scan.range_path = Some(path);
        assert!(!scan.is_loaded());

        scan.load().unwrap();
        assert!(scan.is_loaded());

        let flat = scan.project_to_2d().unwrap();
        assert_eq!(flat.ray_count(), 4);
        assert_eq!(flat.valid_count(), 4);
        assert_relative_eq!(flat.ranges[0], 1.0);
    }

    #[test]
    fn test_scan3d_redirect_external_storage() {
        let mut scan = RangeScan3D::new(Pose3D::identity(), 5.0, PI / 3.0);
        scan.range_path = Some(PathBuf::from("/old/place/depth_000007.bin"));
        scan.intensity_path = Some(PathBuf::from("/old/place/intensity_000007.png"));

        scan.redirect_external_storage(Path::new("/data/session_Images"));

        assert_eq!(
            scan.range_path.as_deref(),
            Some(Path::new("/data/session_Images/depth_000007.bin"))
        );
        assert_eq!(
            scan.intensity_path.as_deref(),
            Some(Path::new("/data/session_Images/intensity_000007.png"))
        );
    }

    #[test]
    fn test_projection_requires_payload() {
        let scan = RangeScan3D::new(Pose3D::identity(), 5.0, PI / 3.0);
        assert!(scan.project_to_2d().is_none());
    }
}
