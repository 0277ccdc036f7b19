//! Synthetic range observations ray-marched over an occupancy grid.
//!
//! Given a sensor pose and a grid, [`RangeSimulator`] fills a
//! [`LaserScan2D`] or a [`SonarRing`] with the ranges a real sensor would
//! have measured: each ray steps one cell edge at a time in world
//! coordinates until it hits an occupied cell, leaves the grid, or exhausts
//! its maximum length. Additive Gaussian range noise and angular jitter are
//! optional; the noise source is seedable for reproducible runs.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use super::{is_unknown, p2l, CellValue, OccupancyGrid};
use crate::core::types::{LaserScan2D, Pose2D, Pose3D, SonarRing};

/// Seedable Gaussian noise source.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    rng: SmallRng,
}

impl NoiseGenerator {
    /// Create a noise generator.
    ///
    /// Seed 0 pulls entropy from the OS; any other seed gives a
    /// reproducible stream.
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_os_rng()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    /// Zero-mean Gaussian sample with the given standard deviation.
    #[inline]
    pub fn gaussian(&mut self, stddev: f32) -> f32 {
        if stddev <= 0.0 {
            return 0.0;
        }
        let n: f32 = self.rng.sample(StandardNormal);
        n * stddev
    }
}

/// Parameters shared by the laser and sonar simulations.
#[derive(Debug, Clone)]
pub struct RangeSimulatorConfig {
    /// Occupancy probability at or above which a cell stops a ray.
    pub occupancy_threshold: f32,

    /// Standard deviation of the additive range noise in meters.
    pub range_noise_std: f32,

    /// Standard deviation of the per-ray angular jitter in radians.
    pub angle_noise_std: f32,

    /// Evaluate every `decimation`-th ray of a laser sweep; skipped
    /// entries stay at range 0 / invalid.
    pub decimation: usize,

    /// Noise seed; 0 means OS entropy.
    pub seed: u64,
}

impl Default for RangeSimulatorConfig {
    fn default() -> Self {
        Self {
            occupancy_threshold: 0.5,
            range_noise_std: 0.0,
            angle_noise_std: 0.0,
            decimation: 1,
            seed: 0,
        }
    }
}

/// Outcome of marching a single ray.
#[derive(Debug, Clone, Copy)]
struct RayReturn {
    range: f32,
    valid: bool,
}

/// Ray-marching simulator for laser and sonar observations.
#[derive(Debug, Clone)]
pub struct RangeSimulator {
    config: RangeSimulatorConfig,
    noise: NoiseGenerator,
}

impl RangeSimulator {
    pub fn new(config: RangeSimulatorConfig) -> Self {
        let noise = NoiseGenerator::new(config.seed);
        Self { config, noise }
    }

    pub fn config(&self) -> &RangeSimulatorConfig {
        &self.config
    }

    /// Simulate a laser sweep into `scan`.
    ///
    /// The scan supplies the sweep geometry (ray count, aperture, direction,
    /// max range, robot-relative sensor pose); its samples are overwritten.
    /// The sensor world pose is `robot_pose ⊕ scan.sensor_pose` projected
    /// onto the plane.
    ///
    /// # Panics
    ///
    /// Panics if the scan carries fewer than 2 rays or the configured
    /// decimation is 0.
    pub fn simulate_laser_scan(
        &mut self,
        grid: &OccupancyGrid,
        scan: &mut LaserScan2D,
        robot_pose: &Pose2D,
    ) {
        let n = scan.ray_count();
        assert!(n >= 2, "a laser sweep needs at least 2 rays");
        assert!(self.config.decimation >= 1, "decimation must be at least 1");

        let sensor = Pose3D::from(*robot_pose).compose(&scan.sensor_pose).to_2d();

        let half = if scan.right_to_left { -0.5 } else { 0.5 };
        let start_angle = sensor.theta + half * scan.aperture;
        let sweep = if scan.right_to_left { 1.0 } else { -1.0 };
        let step = sweep * scan.aperture / (n - 1) as f32;

        let max_ray_len = (scan.max_range / grid.resolution()).round() as u32;
        let occupied_threshold = p2l(self.config.occupancy_threshold);

        scan.reset(n);

        let mut i = 0;
        while i < n {
            let angle = start_angle + i as f32 * step;
            let ray = self.simulate_ray(grid, sensor.x, sensor.y, angle, max_ray_len, occupied_threshold);
            scan.ranges[i] = ray.range;
            scan.valid[i] = ray.valid;
            i += self.config.decimation;
        }
    }

    /// Simulate every transducer of a sonar ring.
    ///
    /// Each cone is fanned into one ray per degree of aperture (plus one);
    /// the sensed distance is the minimum over the valid rays, or 0 when
    /// none returned.
    ///
    /// # Panics
    ///
    /// Panics if the ring's cone aperture is not positive.
    pub fn simulate_sonar(
        &mut self,
        grid: &OccupancyGrid,
        ring: &mut SonarRing,
        robot_pose: &Pose2D,
    ) {
        assert!(ring.cone_aperture > 0.0, "sonar cone aperture must be positive");

        let max_ray_len = (ring.max_sensor_distance / grid.resolution()).round() as u32;
        let occupied_threshold = p2l(self.config.occupancy_threshold);
        let ray_count = (1.0 + ring.cone_aperture / crate::core::math::deg_to_rad(1.0)).ceil() as usize;
        let step = ring.cone_aperture / ray_count as f32;

        for transducer in &mut ring.transducers {
            let sensor = Pose3D::from(*robot_pose)
                .compose(&transducer.sensor_pose)
                .to_2d();

            let mut direction = sensor.theta - 0.5 * ring.cone_aperture;
            let mut closest: Option<f32> = None;
            for _ in 0..ray_count {
                let ray = self.simulate_ray(
                    grid,
                    sensor.x,
                    sensor.y,
                    direction,
                    max_ray_len,
                    occupied_threshold,
                );
                if ray.valid {
                    closest = Some(closest.map_or(ray.range, |c: f32| c.min(ray.range)));
                }
                direction += step;
            }
            transducer.sensed_distance = closest.unwrap_or(0.0);
        }
    }

    /// March a single ray from `(x0, y0)` along `angle`.
    ///
    /// The ray advances one cell edge per step. It stops at the first cell
    /// whose log-odds reach `occupied_threshold`, on leaving the grid, or
    /// after `max_ray_len` steps. A ray that ends on an unknown cell or
    /// outside the grid is invalid; its reported range is the distance to
    /// the first unknown cell crossed, if any, else the distance traversed.
    /// A clean hit is valid iff it happened before `max_ray_len`, with
    /// additive Gaussian noise applied when configured.
    fn simulate_ray(
        &mut self,
        grid: &OccupancyGrid,
        x0: f32,
        y0: f32,
        angle: f32,
        max_ray_len: u32,
        occupied_threshold: CellValue,
    ) -> RayReturn {
        let angle = angle + self.noise.gaussian(self.config.angle_noise_std);
        let (sin_a, cos_a) = angle.sin_cos();
        let dx = cos_a * grid.resolution();
        let dy = sin_a * grid.resolution();

        let mut rx = x0;
        let mut ry = y0;
        let mut ray_len: u32 = 0;
        let mut first_unknown: u32 = max_ray_len + 1;
        let mut hit_cell: CellValue = 0;
        let mut left_grid = false;

        loop {
            let cx = grid.x2idx(rx);
            let cy = grid.y2idx(ry);
            if !grid.is_inside(cx, cy) {
                left_grid = true;
                break;
            }
            hit_cell = grid.cell_unchecked(cx as usize, cy as usize);
            if hit_cell >= occupied_threshold || ray_len >= max_ray_len {
                break;
            }
            if is_unknown(hit_cell) {
                first_unknown = first_unknown.min(ray_len);
            }
            rx += dx;
            ry += dy;
            ray_len += 1;
        }

        if left_grid || is_unknown(hit_cell) {
            let cells = if first_unknown < ray_len {
                first_unknown
            } else {
                ray_len
            };
            RayReturn {
                range: cells as f32 * grid.resolution(),
                valid: false,
            }
        } else {
            let valid = ray_len < max_ray_len;
            let mut range = ray_len as f32 * grid.resolution();
            if self.config.range_noise_std > 0.0 && valid {
                range += self.noise.gaussian(self.config.range_noise_std);
            }
            RayReturn { range, valid }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Pose3D;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn free_corridor() -> OccupancyGrid {
        // 10 m corridor, one cell tall, centered on y = 0
        let mut grid = OccupancyGrid::new(0.0, 10.0, -0.05, 0.05, 0.1);
        grid.fill_probability(0.1);
        grid
    }

    fn simulator() -> RangeSimulator {
        RangeSimulator::new(RangeSimulatorConfig {
            seed: 7,
            ..Default::default()
        })
    }

    fn two_ray_scan(max_range: f32) -> LaserScan2D {
        // Narrow aperture so both rays march essentially along +x
        LaserScan2D::new(2, 1e-4, true, max_range, Pose3D::identity())
    }

    #[test]
    fn test_free_ray_runs_out_of_range() {
        let grid = free_corridor();
        let mut sim = simulator();
        let mut scan = two_ray_scan(5.0);

        sim.simulate_laser_scan(&grid, &mut scan, &Pose2D::identity());

        assert_relative_eq!(scan.ranges[0], 5.0, epsilon = 1e-4);
        assert!(!scan.valid[0]);
    }

    #[test]
    fn test_wall_stops_ray() {
        let mut grid = free_corridor();
        grid.set_cell_probability(30, 0, 0.95); // wall at x = 3.0 m
        let mut sim = simulator();
        let mut scan = two_ray_scan(5.0);

        sim.simulate_laser_scan(&grid, &mut scan, &Pose2D::identity());

        assert!(scan.valid[0]);
        assert!(
            (scan.ranges[0] - 3.0).abs() <= grid.resolution() + 1e-5,
            "hit at {} expected near 3.0",
            scan.ranges[0]
        );
    }

    #[test]
    fn test_unknown_cell_invalidates_ray() {
        let mut grid = free_corridor();
        // Leave cells 20.. unknown
        for cx in 0..20 {
            grid.set_cell_probability(cx, 0, 0.1);
        }
        for cx in 20..100 {
            grid.set_cell(cx, 0, 0);
        }
        let mut sim = RangeSimulator::new(RangeSimulatorConfig {
            occupancy_threshold: 0.7,
            seed: 7,
            ..Default::default()
        });
        let mut scan = two_ray_scan(5.0);

        sim.simulate_laser_scan(&grid, &mut scan, &Pose2D::identity());

        assert!(!scan.valid[0]);
        // First unknown cell sits 20 cells out
        assert_relative_eq!(scan.ranges[0], 2.0, epsilon = 0.11);
    }

    #[test]
    fn test_ray_leaving_grid_is_invalid() {
        let grid = free_corridor();
        let mut sim = simulator();
        let mut scan = two_ray_scan(5.0);

        // Facing -x: out of the grid immediately
        sim.simulate_laser_scan(&grid, &mut scan, &Pose2D::new(0.05, 0.0, std::f32::consts::PI));

        assert!(!scan.valid[0]);
        assert_relative_eq!(scan.ranges[0], 0.1, epsilon = 0.11);
    }

    #[test]
    fn test_sensor_pose_composition() {
        let mut grid = free_corridor();
        grid.set_cell_probability(30, 0, 0.95);
        let mut sim = simulator();
        // Sensor mounted 1 m ahead of the robot
        let mut scan = LaserScan2D::new(
            2,
            1e-4,
            true,
            5.0,
            Pose3D::new(1.0, 0.0, 0.3, 0.0, 0.0, 0.0),
        );

        sim.simulate_laser_scan(&grid, &mut scan, &Pose2D::identity());

        assert!(scan.valid[0]);
        assert!(
            (scan.ranges[0] - 2.0).abs() <= grid.resolution() + 1e-5,
            "hit at {} expected near 2.0",
            scan.ranges[0]
        );
    }

    #[test]
    fn test_angle_noise_perturbs_rays() {
        let mut grid = OccupancyGrid::new(-5.0, 5.0, -5.0, 5.0, 0.1);
        grid.fill_probability(0.1);
        // Wall along x = 2
        for cy in 0..grid.size_y() as i32 {
            grid.set_cell_probability(grid.x2idx(2.0), cy, 0.95);
        }

        let mut sim = RangeSimulator::new(RangeSimulatorConfig {
            angle_noise_std: 0.3,
            seed: 99,
            ..Default::default()
        });
        let mut scan = LaserScan2D::new(32, 1e-3, true, 8.0, Pose3D::identity());
        sim.simulate_laser_scan(&grid, &mut scan, &Pose2D::identity());

        // With strong jitter the (nominally parallel) rays must disagree
        let hits: Vec<f32> = scan
            .ranges
            .iter()
            .zip(&scan.valid)
            .filter(|(_, &v)| v)
            .map(|(&r, _)| r)
            .collect();
        assert!(hits.len() > 2);
        let min = hits.iter().cloned().fold(f32::MAX, f32::min);
        let max = hits.iter().cloned().fold(f32::MIN, f32::max);
        assert!(max - min > 1e-3);
    }

    #[test]
    fn test_perpendicular_ray_direction() {
        let mut grid = OccupancyGrid::new(-5.0, 5.0, -5.0, 5.0, 0.1);
        grid.fill_probability(0.1);
        // Wall along y = 1
        for cx in 0..grid.size_x() as i32 {
            grid.set_cell_probability(cx, grid.y2idx(1.0), 0.95);
        }

        let mut sim = simulator();
        let mut scan = two_ray_scan(4.0);
        sim.simulate_laser_scan(&grid, &mut scan, &Pose2D::new(0.0, 0.0, FRAC_PI_2));

        assert!(scan.valid[0]);
        assert!(
            (scan.ranges[0] - 1.0).abs() <= grid.resolution() + 1e-5,
            "hit at {} expected near 1.0",
            scan.ranges[0]
        );
    }
}
