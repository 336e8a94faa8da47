//! Output surface, camera and the render loop that drives every stage.

mod backend;
mod camera;
mod canvas;
mod engine;

pub use backend::{
    FrameView, HeadlessBackend, RenderBackend, ResourceCounts, ResourceId, ResourceKind,
    ResourceLedger, SurfaceSize,
};
pub use camera::{Camera, ViewMode};
pub use canvas::{CanvasBackend, MAX_SURFACE_EDGE};
pub use engine::{
    EngineObserver, LifecycleState, StopHandle, TickOutcome, VisualiserEngine, MAX_TICK_SECONDS,
};
