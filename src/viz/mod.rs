//! Data-model scene graph for decider visuals.
//!
//! No rendering happens here: the decider publishes named glyphs and image
//! viewports into a [`SceneGraph`] owned by the driver's display, and a
//! renderer (if any) draws whatever the scene holds. The scene sits behind
//! a mutex; every refresh locks it, mutates, unlocks and requests a
//! repaint. Nested acquisition is forbidden by contract.

use std::collections::BTreeMap;
use std::sync::Arc;

use image::GrayImage;
use parking_lot::Mutex;

use crate::core::types::{LaserScan2D, Pose3D};

/// An annulus marking a search radius around a pose.
#[derive(Debug, Clone)]
pub struct DiskGlyph {
    pub pose: Pose3D,
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub color: [u8; 3],
}

/// A planar laser scan drawn at a pose.
#[derive(Debug, Clone)]
pub struct ScanGlyph {
    pub scan: LaserScan2D,
    pub pose: Pose3D,
    pub surface_color: [u8; 4],
}

/// A named drawable object.
#[derive(Debug, Clone)]
pub enum SceneObject {
    Disk(DiskGlyph),
    LaserScan(ScanGlyph),
}

/// A rectangular image overlay; position is (x, y, width, height) in
/// normalized window coordinates.
#[derive(Debug, Clone, Default)]
pub struct Viewport {
    pub position: [f32; 4],
    pub image: Option<GrayImage>,
}

/// Named objects and viewports plus a repaint request counter.
#[derive(Debug, Default)]
pub struct SceneGraph {
    objects: BTreeMap<String, SceneObject>,
    viewports: BTreeMap<String, Viewport>,
    repaints: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_object(&mut self, name: impl Into<String>, object: SceneObject) {
        self.objects.insert(name.into(), object);
    }

    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.get(name)
    }

    pub fn object_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.get_mut(name)
    }

    /// Create an empty viewport at the given normalized position.
    pub fn create_viewport(&mut self, name: impl Into<String>, position: [f32; 4]) {
        self.viewports.insert(
            name.into(),
            Viewport {
                position,
                image: None,
            },
        );
    }

    pub fn viewport(&self, name: &str) -> Option<&Viewport> {
        self.viewports.get(name)
    }

    pub fn viewport_mut(&mut self, name: &str) -> Option<&mut Viewport> {
        self.viewports.get_mut(name)
    }

    pub fn has_viewport(&self, name: &str) -> bool {
        self.viewports.contains_key(name)
    }

    /// Ask the renderer for a redraw.
    pub fn force_repaint(&mut self) {
        self.repaints += 1;
    }

    /// How many repaints have been requested.
    pub fn repaints(&self) -> u64 {
        self.repaints
    }
}

/// Driver-shared handle to a scene.
pub type DisplayHandle = Arc<Mutex<SceneGraph>>;

/// Convenience constructor for a fresh display handle.
pub fn new_display_handle() -> DisplayHandle {
    Arc::new(Mutex::new(SceneGraph::new()))
}
