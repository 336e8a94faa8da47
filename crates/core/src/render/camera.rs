use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::render::SurfaceSize;

/// Projection strategy: full 3D perspective or a flat orthographic view of
/// the XY plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    Perspective,
    Flat,
}

const EYE_DISTANCE: f32 = 5.0;
const NEAR: f32 = 0.1;
const FAR: f32 = 100.0;
/// Half the visible height of the flat view, in scene units.
const FLAT_HALF_HEIGHT: f32 = 2.4;

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    mode: ViewMode,
    fov_y: f32,
    surface: SurfaceSize,
    view: Mat4,
    projection: Mat4,
}

impl Camera {
    pub fn new(mode: ViewMode, fov_deg: f32, surface: SurfaceSize) -> Self {
        let view = Mat4::look_at_rh(Vec3::Z * EYE_DISTANCE, Vec3::ZERO, Vec3::Y);
        let mut camera = Self {
            mode,
            fov_y: fov_deg.clamp(10.0, 150.0).to_radians(),
            surface,
            view,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection();
        camera
    }

    /// Recomputes the projection for a new surface size. Nothing else about
    /// the view changes.
    pub fn resize(&mut self, surface: SurfaceSize) {
        self.surface = surface;
        self.update_projection();
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
        self.update_projection();
    }

    fn update_projection(&mut self) {
        let aspect = self.surface.aspect();
        self.projection = match self.mode {
            ViewMode::Perspective => Mat4::perspective_rh(self.fov_y, aspect, NEAR, FAR),
            ViewMode::Flat => {
                let h = FLAT_HALF_HEIGHT;
                Mat4::orthographic_rh(-h * aspect, h * aspect, -h, h, NEAR, FAR)
            }
        };
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn surface(&self) -> SurfaceSize {
        self.surface
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Projects a world-space point to pixel coordinates (origin top-left).
    /// Returns `None` for points behind the camera.
    pub fn project(&self, view_projection: &Mat4, point: Vec3) -> Option<Vec2> {
        let clip = *view_projection * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x * 0.5 + 0.5) * self.surface.width as f32,
            (0.5 - ndc.y * 0.5) * self.surface.height as f32,
        ))
    }

    /// Pixels per scene unit at the origin plane, used to size sprites.
    pub fn pixels_per_unit(&self) -> f32 {
        let height = self.surface.height as f32;
        match self.mode {
            ViewMode::Perspective => height / (2.0 * EYE_DISTANCE * (self.fov_y / 2.0).tan()),
            ViewMode::Flat => height / (2.0 * FLAT_HALF_HEIGHT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_projects_to_surface_center() {
        for mode in [ViewMode::Perspective, ViewMode::Flat] {
            let camera = Camera::new(mode, 60.0, SurfaceSize::new(800, 600));
            let vp = camera.view_projection();
            let center = camera.project(&vp, Vec3::ZERO).unwrap();
            assert!((center - Vec2::new(400.0, 300.0)).length() < 1e-3);
        }
    }

    #[test]
    fn up_is_towards_the_top_of_the_surface() {
        let camera = Camera::new(ViewMode::Flat, 60.0, SurfaceSize::new(400, 400));
        let vp = camera.view_projection();
        let up = camera.project(&vp, Vec3::Y).unwrap();
        assert!(up.y < 200.0);
    }

    #[test]
    fn resize_only_changes_projection() {
        let mut camera = Camera::new(ViewMode::Perspective, 60.0, SurfaceSize::new(800, 600));
        let before = camera.projection();
        camera.resize(SurfaceSize::new(1600, 600));
        assert_ne!(camera.projection(), before);
        assert_eq!(camera.mode(), ViewMode::Perspective);
        assert_eq!(camera.surface(), SurfaceSize::new(1600, 600));
    }

    #[test]
    fn points_behind_the_eye_are_culled() {
        let camera = Camera::new(ViewMode::Perspective, 60.0, SurfaceSize::new(100, 100));
        let vp = camera.view_projection();
        assert!(camera.project(&vp, Vec3::Z * 10.0).is_none());
    }
}
