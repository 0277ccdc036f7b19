//! ICP-goodness edge registration.
//!
//! As a driver appends nodes to a pose graph, the
//! [`EdgeRegistrationDecider`] watches the per-step observations, keeps a
//! node→scan registry, and for every new node runs pairwise ICP against the
//! scans of geometrically nearby nodes. Alignments whose goodness clears the
//! configured threshold become graph edges; edges spanning a large node-id
//! gap are additionally counted as loop closures.
//!
//! The decider is purely reactive: all work happens inside [`update`]
//! (and the optional visual refresh), driven by a single thread.
//!
//! [`update`]: EdgeRegistrationDecider::update

mod config;

pub use config::{DeciderParams, LoadedConfig, VisualizationParams};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::GrayImage;
use parking_lot::Mutex;

use crate::core::types::{
    ActionCollection, LaserScan2D, Measurement, Pose3D, RangeImage, RangeScan3D, SensoryFrame,
};
use crate::error::{Result, SetuError};
use crate::graph::{NodeId, PoseGraph};
use crate::matching::{IcpConfig, IcpSolver};
use crate::viz::{DiskGlyph, DisplayHandle, ScanGlyph, SceneObject};

/// Consecutive unrecognized observation steps tolerated before warning.
const INVALID_FORMAT_STEP_LIMIT: u32 = 20;

const SEARCH_DISK_NAME: &str = "ICP_max_distance";
const LASER_SCAN_VIZ_NAME: &str = "laser_scan_viz";
const INTENSITY_VIEWPORT_NAME: &str = "viewp_intensity";
const RANGE_VIEWPORT_NAME: &str = "viewp_range";

const SEARCH_DISK_COLOR: [u8; 3] = [142, 142, 56];
const LASER_SCAN_COLOR: [u8; 4] = [0, 20, 255, 255];

/// Range-image viewport brightness: this many meters map to white.
const RANGE_VIEW_SCALE: f32 = 5.0;

/// Classes of edges the decider registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EdgeLabel {
    /// Edge from a planar-scan alignment.
    Icp2d,
    /// Edge from a 3D range-scan alignment.
    Icp3d,
    /// Edge whose node-id gap marks it as a loop closure.
    LoopClosure,
}

impl EdgeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeLabel::Icp2d => "ICP2D",
            EdgeLabel::Icp3d => "ICP3D",
            EdgeLabel::LoopClosure => "LC",
        }
    }
}

/// Online decider that registers ICP edges (and loop closures) between a
/// new graph node and its geometric neighbors.
pub struct EdgeRegistrationDecider<G: PoseGraph> {
    graph: Option<Arc<Mutex<G>>>,
    display: Option<DisplayHandle>,
    solver: Box<dyn IcpSolver>,

    params: DeciderParams,
    visualization: VisualizationParams,
    icp_config: IcpConfig,
    has_read_config: bool,
    rawlog_path: Option<PathBuf>,

    last_scan_2d: Option<Arc<LaserScan2D>>,
    last_scan_3d: Option<Arc<RangeScan3D>>,
    /// Planar projection of the latest 3D scan, for visualization only.
    projected_scan_2d: Option<LaserScan2D>,
    using_3d: bool,

    last_total_nodes: usize,
    scans_2d: BTreeMap<NodeId, Arc<LaserScan2D>>,
    scans_3d: BTreeMap<NodeId, Arc<RangeScan3D>>,

    edge_counts: BTreeMap<EdgeLabel, u32>,
    just_inserted_loop_closure: bool,

    initialized_visuals: bool,
    initialized_range_viewports: bool,

    checked_usable_dataset: bool,
    invalid_format_steps: u32,
}

impl<G: PoseGraph> EdgeRegistrationDecider<G> {
    /// Create a decider around an ICP solver, with default parameters.
    pub fn new(solver: Box<dyn IcpSolver>) -> Self {
        let mut edge_counts = BTreeMap::new();
        edge_counts.insert(EdgeLabel::Icp2d, 0);
        edge_counts.insert(EdgeLabel::Icp3d, 0);
        edge_counts.insert(EdgeLabel::LoopClosure, 0);

        log::info!("edge registration decider initialized");

        Self {
            graph: None,
            display: None,
            solver,
            params: DeciderParams::default(),
            visualization: VisualizationParams::default(),
            icp_config: IcpConfig::default(),
            has_read_config: false,
            rawlog_path: None,
            last_scan_2d: None,
            last_scan_3d: None,
            projected_scan_2d: None,
            using_3d: false,
            // the pipeline seeds the graph with a two-node skeleton
            last_total_nodes: 2,
            scans_2d: BTreeMap::new(),
            scans_3d: BTreeMap::new(),
            edge_counts,
            just_inserted_loop_closure: false,
            initialized_visuals: false,
            initialized_range_viewports: false,
            checked_usable_dataset: false,
            invalid_format_steps: 0,
        }
    }

    /// Bind the driver's pose graph. Must happen before [`update`].
    ///
    /// [`update`]: EdgeRegistrationDecider::update
    pub fn set_graph(&mut self, graph: Arc<Mutex<G>>) {
        self.graph = Some(graph);
        log::info!("pose graph bound");
    }

    /// Bind the driver's display handle for the optional visuals.
    pub fn set_display(&mut self, display: DisplayHandle) {
        self.display = Some(display);
        log::info!("display handle bound");
    }

    /// Record the dataset path. If a sibling directory named
    /// `<stem>_Images/` exists, it becomes the external storage directory
    /// used to resolve 3D-scan image paths.
    pub fn set_rawlog_path(&mut self, path: &Path) {
        self.rawlog_path = Some(path.to_path_buf());
        log::info!("dataset path bound: {}", path.display());

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let images_dir = path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(format!("{stem}_Images"));

        if images_dir.is_dir() {
            log::info!("3D scan image storage found: {}", images_dir.display());
            self.params.scan_images_external_directory =
                images_dir.to_string_lossy().into_owned();
        } else {
            log::debug!("no 3D scan image storage at {}", images_dir.display());
        }
    }

    /// Load parameters from a sectioned configuration file.
    pub fn load_config(&mut self, path: &Path, section: &str) -> Result<()> {
        let loaded = LoadedConfig::from_file(path, section)?;
        self.apply_config(loaded);
        Ok(())
    }

    /// Apply an already parsed configuration.
    pub fn apply_config(&mut self, loaded: LoadedConfig) {
        log::info!(
            "parameters loaded: ICP radius {:.2} m, goodness threshold {:.2}, LC gap {}",
            loaded.params.icp_max_distance,
            loaded.params.icp_goodness_thresh,
            loaded.params.lc_min_nodeid_diff,
        );
        self.params = loaded.params;
        self.visualization = loaded.visualization;
        self.icp_config = loaded.icp;
        self.has_read_config = true;
    }

    /// Advance one dataset step.
    ///
    /// Exactly one of `observations` (a sensory frame) or `observation`
    /// (a single measurement) is expected per non-empty step; the action
    /// collection is accepted for dataset symmetry and ignored.
    pub fn update(
        &mut self,
        _action: Option<&ActionCollection>,
        observations: Option<&SensoryFrame>,
        observation: Option<Measurement>,
    ) -> Result<()> {
        let graph = self.graph.clone().ok_or(SetuError::GraphNotBound)?;

        // New-node detection: the counter never decreases.
        let node_count = graph.lock().node_count();
        let mut registered_new_node = false;
        if self.last_total_nodes < node_count {
            registered_new_node = true;
            self.last_total_nodes = node_count;
        }

        // The latch describes the most recent call only.
        self.just_inserted_loop_closure = false;

        let observation_present = observation.is_some();
        let mut saw_scan = false;

        if let Some(measurement) = observation {
            // Observation-only dataset format.
            match measurement {
                Measurement::LaserScan2D(scan) => {
                    self.last_scan_2d = Some(scan);
                    self.using_3d = false;
                    saw_scan = true;
                }
                Measurement::RangeScan3D(mut scan) => {
                    if !self.params.scan_images_external_directory.is_empty() {
                        scan.redirect_external_storage(Path::new(
                            &self.params.scan_images_external_directory,
                        ));
                    }
                    scan.load()?;
                    self.projected_scan_2d = scan.project_to_2d();
                    self.last_scan_3d = Some(Arc::new(*scan));
                    self.using_3d = true;
                    saw_scan = true;
                }
                Measurement::Odometry(_) => {}
            }

            if registered_new_node {
                self.bind_latest_scan((node_count - 1) as NodeId);
            }
        } else if let Some(frame) = observations {
            // Action/observations dataset format: take the frame's first
            // planar scan as the latest one, present or not.
            self.last_scan_2d = frame.first_laser_scan_2d();
            if registered_new_node && self.last_scan_2d.is_some() {
                self.bind_latest_scan((node_count - 1) as NodeId);
            }
        }

        if registered_new_node {
            let new_node = (node_count - 1) as NodeId;
            let candidates = self.nearby_nodes_of(&graph, new_node, self.params.icp_max_distance);
            log::debug!(
                "{} candidate nodes within range of node {new_node}",
                candidates.len()
            );

            if self.using_3d {
                self.check_registration_condition_3d(&graph, new_node, &candidates);
            } else {
                self.check_registration_condition_2d(&graph, new_node, &candidates);
            }
        }

        if !self.checked_usable_dataset {
            self.check_if_invalid_dataset(observation_present, saw_scan);
        }

        Ok(())
    }

    /// Snapshot of the per-class edge counters.
    pub fn edge_stats(&self) -> BTreeMap<EdgeLabel, u32> {
        self.edge_counts.clone()
    }

    /// Whether the most recent [`update`] registered a loop closure.
    ///
    /// [`update`]: EdgeRegistrationDecider::update
    pub fn just_inserted_loop_closure(&self) -> bool {
        self.just_inserted_loop_closure
    }

    /// Current decider parameters.
    pub fn params(&self) -> &DeciderParams {
        &self.params
    }

    /// The `ICP` parameter block forwarded to the solver.
    pub fn icp_config(&self) -> &IcpConfig {
        &self.icp_config
    }

    /// Whether the session has latched onto 3D scans.
    pub fn is_using_3d(&self) -> bool {
        self.using_3d
    }

    /// Node ids with a registered planar scan, ascending.
    pub fn registered_2d_nodes(&self) -> Vec<NodeId> {
        self.scans_2d.keys().copied().collect()
    }

    /// Node ids with a registered 3D scan, ascending.
    pub fn registered_3d_nodes(&self) -> Vec<NodeId> {
        self.scans_3d.keys().copied().collect()
    }

    /// Whether the dataset-format sanity check has concluded.
    pub fn dataset_check_done(&self) -> bool {
        self.checked_usable_dataset
    }

    /// The dataset path recorded by [`set_rawlog_path`], if any.
    ///
    /// [`set_rawlog_path`]: EdgeRegistrationDecider::set_rawlog_path
    pub fn rawlog_path(&self) -> Option<&Path> {
        self.rawlog_path.as_deref()
    }

    /// Seed the planar-scan registry for a node that predates the decider
    /// (initial graph skeleton, or a session being resumed).
    pub fn attach_laser_scan(&mut self, node: NodeId, scan: Arc<LaserScan2D>) {
        self.scans_2d.insert(node, scan);
    }

    /// Seed the 3D-scan registry for a node that predates the decider.
    pub fn attach_range_scan_3d(&mut self, node: NodeId, scan: Arc<RangeScan3D>) {
        self.scans_3d.insert(node, scan);
    }

    fn bind_latest_scan(&mut self, node: NodeId) {
        if self.using_3d {
            if let Some(scan) = &self.last_scan_3d {
                self.scans_3d.insert(node, Arc::clone(scan));
                log::debug!("bound 3D scan to node {node}");
            }
        } else if let Some(scan) = &self.last_scan_2d {
            self.scans_2d.insert(node, Arc::clone(scan));
            log::debug!("bound laser scan to node {node}");
        }
    }

    /// Candidate set for pairwise ICP against `cur`: every prior node whose
    /// pose lies within `distance`, or all prior nodes when the radius is
    /// not positive. Never contains `cur` itself.
    fn nearby_nodes_of(
        &self,
        graph: &Arc<Mutex<G>>,
        cur: NodeId,
        distance: f32,
    ) -> BTreeSet<NodeId> {
        let graph = graph.lock();
        let mut out = BTreeSet::new();

        if distance > 0.0 {
            for id in 0..graph.node_count().saturating_sub(1) as NodeId {
                if let Some(d) = graph.distance_between(id, cur) {
                    if d <= distance {
                        out.insert(id);
                    }
                }
            }
        } else {
            graph.collect_node_ids(&mut out);
            out.remove(&cur);
        }
        out
    }

    fn check_registration_condition_2d(
        &mut self,
        graph: &Arc<Mutex<G>>,
        new_node: NodeId,
        candidates: &BTreeSet<NodeId>,
    ) {
        // Nothing to align without the new node's own scan.
        let Some(current) = self.scans_2d.get(&new_node).cloned() else {
            return;
        };

        for &candidate in candidates {
            let Some(previous) = self.scans_2d.get(&candidate).cloned() else {
                continue;
            };
            let summary =
                self.solver
                    .align_laser_scans(&self.icp_config, &previous, &current, None);
            if summary.goodness > self.params.icp_goodness_thresh {
                self.register_edge(
                    graph,
                    candidate,
                    new_node,
                    summary.relative_pose,
                    EdgeLabel::Icp2d,
                );
            }
        }
    }

    fn check_registration_condition_3d(
        &mut self,
        graph: &Arc<Mutex<G>>,
        new_node: NodeId,
        candidates: &BTreeSet<NodeId>,
    ) {
        let Some(current) = self.scans_3d.get(&new_node).cloned() else {
            return;
        };

        for &candidate in candidates {
            let Some(previous) = self.scans_3d.get(&candidate).cloned() else {
                continue;
            };
            let summary =
                self.solver
                    .align_range_scans(&self.icp_config, &previous, &current, None);
            if summary.goodness > self.params.icp_goodness_thresh {
                self.register_edge(
                    graph,
                    candidate,
                    new_node,
                    summary.relative_pose,
                    EdgeLabel::Icp3d,
                );
            }
        }
    }

    fn register_edge(
        &mut self,
        graph: &Arc<Mutex<G>>,
        from: NodeId,
        to: NodeId,
        constraint: Pose3D,
        label: EdgeLabel,
    ) {
        log::info!("registering {} edge {from} -> {to}", label.as_str());
        graph.lock().insert_edge(from, to, constraint);
        *self.edge_counts.entry(label).or_insert(0) += 1;

        if to.saturating_sub(from) > self.params.lc_min_nodeid_diff {
            *self.edge_counts.entry(EdgeLabel::LoopClosure).or_insert(0) += 1;
            self.just_inserted_loop_closure = true;
            log::info!("loop closure between nodes {from} and {to}");
        }
    }

    /// Until the first recognized scan, count unrecognized observation
    /// steps and warn once if the dataset never yields usable data.
    fn check_if_invalid_dataset(&mut self, observation_present: bool, saw_scan: bool) {
        if observation_present {
            if saw_scan {
                self.checked_usable_dataset = true;
                return;
            }
            self.invalid_format_steps += 1;
        } else {
            // action/sensory-frame steps are an acceptable format
            self.checked_usable_dataset = true;
            return;
        }

        if self.invalid_format_steps > INVALID_FORMAT_STEP_LIMIT {
            log::warn!(
                "no usable scan data in the first {} observation steps; \
                 expected planar laser scans or 3D range scans",
                self.invalid_format_steps
            );
            self.checked_usable_dataset = true;
        }
    }

    /// Publish the decider's scene objects. Requires loaded configuration
    /// and a bound display.
    pub fn initialize_visuals(&mut self) -> Result<()> {
        if !self.has_read_config {
            return Err(SetuError::ConfigNotLoaded);
        }
        let display = self.display.clone().ok_or(SetuError::DisplayNotBound)?;
        log::info!("initializing edge registration visuals");

        if self.params.icp_max_distance > 0.0 {
            let mut scene = display.lock();
            scene.insert_object(
                SEARCH_DISK_NAME,
                SceneObject::Disk(DiskGlyph {
                    pose: Pose3D::identity(),
                    inner_radius: self.params.icp_max_distance - 0.5,
                    outer_radius: self.params.icp_max_distance,
                    color: SEARCH_DISK_COLOR,
                }),
            );
            scene.force_repaint();
        }

        if self.visualization.visualize_laser_scans {
            let mut scene = display.lock();
            scene.insert_object(
                LASER_SCAN_VIZ_NAME,
                SceneObject::LaserScan(ScanGlyph {
                    scan: LaserScan2D::default(),
                    pose: Pose3D::identity(),
                    surface_color: LASER_SCAN_COLOR,
                }),
            );
            scene.force_repaint();
        }

        self.initialized_visuals = true;
        Ok(())
    }

    /// Refresh the scene from the current decider state. Never mutates
    /// registration state.
    pub fn update_visuals(&mut self) -> Result<()> {
        if !self.initialized_visuals {
            return Err(SetuError::VisualsNotInitialized);
        }
        let display = self.display.clone().ok_or(SetuError::DisplayNotBound)?;
        let graph = self.graph.clone().ok_or(SetuError::GraphNotBound)?;

        let newest_pose = {
            let graph = graph.lock();
            match graph.node_count() {
                0 => None,
                n => graph.node_pose((n - 1) as NodeId),
            }
        };

        // Search-radius disk follows the newest node.
        if self.params.icp_max_distance > 0.0 {
            if let Some(pose) = newest_pose {
                let mut scene = display.lock();
                if let Some(SceneObject::Disk(disk)) = scene.object_mut(SEARCH_DISK_NAME) {
                    disk.pose = pose;
                }
                scene.force_repaint();
            }
        }

        // Scan glyph: prefer the projection of the latest 3D scan.
        if self.visualization.visualize_laser_scans {
            let scan = self
                .projected_scan_2d
                .clone()
                .or_else(|| self.last_scan_2d.as_deref().cloned());
            if let (Some(scan), Some(pose)) = (scan, newest_pose) {
                let mut scene = display.lock();
                if let Some(SceneObject::LaserScan(glyph)) = scene.object_mut(LASER_SCAN_VIZ_NAME)
                {
                    glyph.scan = scan;
                    // drawn below the graph so loop-closure edges stay visible
                    glyph.pose = pose.with_z(-0.5);
                }
                scene.force_repaint();
            }
        }

        if self.using_3d {
            self.refresh_range_viewports(&display);
        }

        Ok(())
    }

    fn refresh_range_viewports(&mut self, display: &DisplayHandle) {
        if !self.initialized_range_viewports {
            log::debug!("creating range/intensity viewports");
            let mut scene = display.lock();
            if self.visualization.enable_intensity_viewport {
                scene.create_viewport(INTENSITY_VIEWPORT_NAME, [0.78, 0.56, 0.20, 0.20]);
            }
            if self.visualization.enable_range_viewport {
                scene.create_viewport(RANGE_VIEWPORT_NAME, [0.78, 0.34, 0.20, 0.20]);
            }
            scene.force_repaint();
            self.initialized_range_viewports = true;
        }

        let Some(scan) = self.last_scan_3d.clone() else {
            return;
        };

        if self.visualization.enable_intensity_viewport {
            if let Some(intensity) = &scan.intensity_image {
                let mut scene = display.lock();
                if let Some(viewport) = scene.viewport_mut(INTENSITY_VIEWPORT_NAME) {
                    viewport.image = Some(intensity.clone());
                }
                scene.force_repaint();
            }
        }

        if self.visualization.enable_range_viewport {
            if let Some(range_image) = &scan.range_image {
                let gray = range_image_to_gray(range_image);
                let mut scene = display.lock();
                if let Some(viewport) = scene.viewport_mut(RANGE_VIEWPORT_NAME) {
                    viewport.image = Some(gray);
                }
                scene.force_repaint();
            }
        }
    }
}

/// Normalize a range image into an 8-bit viewport image.
fn range_image_to_gray(img: &RangeImage) -> GrayImage {
    GrayImage::from_fn(img.width() as u32, img.height() as u32, |x, y| {
        let v = (img.get(y as usize, x as usize) / RANGE_VIEW_SCALE).clamp(0.0, 1.0);
        image::Luma([(v * 255.0) as u8])
    })
}
