use std::{collections::HashMap, ops::Add, path::Path};

use tracing::{debug, warn};

use crate::{
    particles::Particle,
    render::Camera,
    scene::{Rgb, SceneGraph},
    Result, VisualiserError,
};

/// Host-managed output surface dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Geometry,
    Material,
    Texture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u64);

/// Live resource totals per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
}

impl ResourceCounts {
    pub fn total(&self) -> usize {
        self.geometries + self.materials + self.textures
    }
}

impl Add for ResourceCounts {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            geometries: self.geometries + other.geometries,
            materials: self.materials + other.materials,
            textures: self.textures + other.textures,
        }
    }
}

/// Bookkeeping of every resource a backend has handed out.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    next_id: u64,
    live: HashMap<ResourceId, ResourceKind>,
    released: u64,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, kind: ResourceKind) -> ResourceId {
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        self.live.insert(id, kind);
        id
    }

    /// Releases `id`. Unknown or already released ids are a logged no-op.
    pub fn release(&mut self, id: ResourceId) -> bool {
        match self.live.remove(&id) {
            Some(_) => {
                self.released += 1;
                true
            }
            None => {
                debug!(id = id.0, "release of unknown or already released resource");
                false
            }
        }
    }

    pub fn counts(&self) -> ResourceCounts {
        let mut counts = ResourceCounts::default();
        for kind in self.live.values() {
            match kind {
                ResourceKind::Geometry => counts.geometries += 1,
                ResourceKind::Material => counts.materials += 1,
                ResourceKind::Texture => counts.textures += 1,
            }
        }
        counts
    }

    pub fn released_total(&self) -> u64 {
        self.released
    }

    /// Drops every live entry, returning how many were still outstanding.
    pub fn release_all(&mut self) -> usize {
        let outstanding = self.live.len();
        if outstanding > 0 {
            warn!(outstanding, "releasing resources still held at shutdown");
        }
        self.released += outstanding as u64;
        self.live.clear();
        outstanding
    }
}

/// Everything a backend needs to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub scene: &'a SceneGraph,
    pub particles: &'a [Particle],
    pub camera: &'a Camera,
    pub background: Rgb,
}

/// Rendering backend abstraction. Implementations own the output surface and
/// every geometry, material and texture allocated on it.
pub trait RenderBackend {
    fn name(&self) -> &'static str;

    /// (Re)creates the output surface at `surface` size.
    fn configure(&mut self, surface: SurfaceSize) -> Result<()>;

    fn allocate(&mut self, kind: ResourceKind) -> ResourceId;

    /// Releases one resource; `false` when it was not live.
    fn release(&mut self, id: ResourceId) -> bool;

    fn live_resources(&self) -> ResourceCounts;

    fn draw(&mut self, frame: &FrameView<'_>) -> Result<()>;

    /// Whether this backend is the last-resort placeholder path.
    fn is_fallback(&self) -> bool {
        false
    }

    /// Writes the last drawn frame to `path` when the backend has pixels.
    fn save_snapshot(&self, _path: &Path) -> Result<()> {
        Err(VisualiserError::msg(format!(
            "{} backend has no raster output",
            self.name()
        )))
    }

    /// Tears down the surface. Safe to call more than once.
    fn shutdown(&mut self) {}
}

/// Backend without pixels: tracks resources and counts draws. Also serves as
/// the static placeholder when a real surface cannot be used.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    ledger: ResourceLedger,
    surface: Option<SurfaceSize>,
    frames: u64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn surface(&self) -> Option<SurfaceSize> {
        self.surface
    }
}

impl RenderBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn configure(&mut self, surface: SurfaceSize) -> Result<()> {
        self.surface = Some(surface);
        Ok(())
    }

    fn allocate(&mut self, kind: ResourceKind) -> ResourceId {
        self.ledger.allocate(kind)
    }

    fn release(&mut self, id: ResourceId) -> bool {
        self.ledger.release(id)
    }

    fn live_resources(&self) -> ResourceCounts {
        self.ledger.counts()
    }

    fn draw(&mut self, _frame: &FrameView<'_>) -> Result<()> {
        self.frames += 1;
        Ok(())
    }

    fn is_fallback(&self) -> bool {
        true
    }

    fn shutdown(&mut self) {
        self.ledger.release_all();
        self.surface = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_counts_by_kind() {
        let mut ledger = ResourceLedger::new();
        let geometry = ledger.allocate(ResourceKind::Geometry);
        ledger.allocate(ResourceKind::Material);
        ledger.allocate(ResourceKind::Texture);

        assert_eq!(
            ledger.counts(),
            ResourceCounts {
                geometries: 1,
                materials: 1,
                textures: 1
            }
        );
        assert!(ledger.release(geometry));
        assert_eq!(ledger.counts().geometries, 0);
    }

    #[test]
    fn double_release_is_a_no_op() {
        let mut ledger = ResourceLedger::new();
        let id = ledger.allocate(ResourceKind::Material);
        assert!(ledger.release(id));
        assert!(!ledger.release(id));
        assert_eq!(ledger.released_total(), 1);
    }

    #[test]
    fn surface_aspect_handles_zero_height() {
        assert_eq!(SurfaceSize::new(1920, 1080).aspect(), 1920.0 / 1080.0);
        assert_eq!(SurfaceSize::new(10, 0).aspect(), 1.0);
        assert!(SurfaceSize::new(10, 0).is_empty());
    }
}
