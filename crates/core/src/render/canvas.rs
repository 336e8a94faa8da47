use std::path::Path;

use glam::{Mat4, Vec3};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};
use tracing::{debug, trace};

use crate::{
    render::{
        FrameView, RenderBackend, ResourceCounts, ResourceId, ResourceKind, ResourceLedger,
        SurfaceSize,
    },
    scene::{NodeId, Rgb, Shape},
    Result, VisualiserError,
};

/// Upper bound on either surface dimension.
pub const MAX_SURFACE_EDGE: u32 = 8192;

const LINE_WIDTH: f32 = 1.5;

/// Software rasteriser drawing node outlines, sprites and particles into a
/// pixmap.
pub struct CanvasBackend {
    ledger: ResourceLedger,
    pixmap: Option<Pixmap>,
    frames: u64,
}

impl CanvasBackend {
    pub fn new() -> Self {
        Self {
            ledger: ResourceLedger::new(),
            pixmap: None,
            frames: 0,
        }
    }

    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl std::fmt::Debug for CanvasBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasBackend")
            .field("size", &self.pixmap.as_ref().map(|p| (p.width(), p.height())))
            .field("live", &self.ledger.counts())
            .field("frames", &self.frames)
            .finish()
    }
}

impl Default for CanvasBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn paint_for(color: Rgb, alpha: f32) -> Paint<'static> {
    let [r, g, b, a] = color.to_rgba8(alpha);
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

fn stroke_polyline(
    pixmap: &mut Pixmap,
    frame: &FrameView<'_>,
    matrix: &Mat4,
    points: &[Vec3],
    paint: &Paint<'_>,
    stroke: &Stroke,
) {
    let mut builder = PathBuilder::new();
    let mut pen_down = false;
    for point in points {
        match frame.camera.project(matrix, *point) {
            Some(pixel) if pen_down => builder.line_to(pixel.x, pixel.y),
            Some(pixel) => {
                builder.move_to(pixel.x, pixel.y);
                pen_down = true;
            }
            None => pen_down = false,
        }
    }
    if let Some(path) = builder.finish() {
        pixmap.stroke_path(&path, paint, stroke, Transform::identity(), None);
    }
}

fn fill_dot(pixmap: &mut Pixmap, x: f32, y: f32, radius: f32, paint: &Paint<'_>) {
    if let Some(path) = PathBuilder::from_circle(x, y, radius.max(0.5)) {
        pixmap.fill_path(&path, paint, FillRule::Winding, Transform::identity(), None);
    }
}

impl RenderBackend for CanvasBackend {
    fn name(&self) -> &'static str {
        "canvas"
    }

    fn configure(&mut self, surface: SurfaceSize) -> Result<()> {
        if surface.width > MAX_SURFACE_EDGE || surface.height > MAX_SURFACE_EDGE {
            return Err(VisualiserError::SurfaceUnavailable(format!(
                "{}x{} exceeds the {MAX_SURFACE_EDGE}px limit",
                surface.width, surface.height
            )));
        }
        let pixmap = Pixmap::new(surface.width, surface.height).ok_or_else(|| {
            VisualiserError::SurfaceUnavailable(format!(
                "cannot allocate a {}x{} pixmap",
                surface.width, surface.height
            ))
        })?;
        debug!(width = surface.width, height = surface.height, "canvas configured");
        self.pixmap = Some(pixmap);
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

    fn draw(&mut self, frame: &FrameView<'_>) -> Result<()> {
        let pixmap = self
            .pixmap
            .as_mut()
            .ok_or_else(|| VisualiserError::SurfaceUnavailable("canvas not configured".into()))?;

        let [r, g, b, a] = frame.background.to_rgba8(1.0);
        pixmap.fill(Color::from_rgba8(r, g, b, a));

        let view_projection = frame.camera.view_projection();
        let pixels_per_unit = frame.camera.pixels_per_unit();
        let graph = frame.scene;

        for (index, node) in graph.nodes().iter().enumerate() {
            let id = NodeId(index);
            let matrix = view_projection * graph.world_matrix(id);
            let glow = graph.effective_emissive(id);
            let color = node.material.color.lerp(node.material.emissive, glow * 0.5);
            let paint = paint_for(color, node.material.opacity);

            match &node.shape {
                Shape::Points { positions, size } => {
                    let radius = size * pixels_per_unit * graph.effective_scale(id).x;
                    for position in positions {
                        if let Some(pixel) = frame.camera.project(&matrix, *position) {
                            fill_dot(pixmap, pixel.x, pixel.y, radius, &paint);
                        }
                    }
                }
                shape => {
                    let stroke = Stroke {
                        width: if node.material.wireframe {
                            LINE_WIDTH * 0.75
                        } else {
                            LINE_WIDTH
                        },
                        ..Stroke::default()
                    };
                    for outline in shape.outlines() {
                        stroke_polyline(pixmap, frame, &matrix, &outline, &paint, &stroke);
                    }
                }
            }
        }

        let root = view_projection * graph.root.matrix();
        for particle in frame.particles {
            let position = Vec3::new(particle.position.x, particle.position.y, 0.0);
            if let Some(pixel) = frame.camera.project(&root, position) {
                let paint = paint_for(particle.color, particle.opacity);
                fill_dot(
                    pixmap,
                    pixel.x,
                    pixel.y,
                    particle.radius * pixels_per_unit,
                    &paint,
                );
            }
        }

        self.frames += 1;
        trace!(frame = self.frames, nodes = graph.len(), "canvas frame drawn");
        Ok(())
    }

    fn save_snapshot(&self, path: &Path) -> Result<()> {
        let pixmap = self
            .pixmap
            .as_ref()
            .ok_or_else(|| VisualiserError::SurfaceUnavailable("canvas not configured".into()))?;
        pixmap
            .save_png(path)
            .map_err(|err| VisualiserError::msg(format!("failed to write snapshot: {err}")))
    }

    fn shutdown(&mut self) {
        self.ledger.release_all();
        self.pixmap = None;
    }
}
