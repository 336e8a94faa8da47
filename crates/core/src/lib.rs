//! Core library for the harmonic visualiser.
//!
//! A single-threaded engine that turns a frequency spectrum into animated
//! sacred-geometry scenes. Each module owns one stage of the per-tick
//! pipeline (spectrum pull, band extraction, prime detection, modulation,
//! particles, rendering) and [`VisualiserEngine`] drives them through the
//! scene lifecycle.

pub mod analysis;
pub mod audio;
pub mod bands;
pub mod config;
pub mod error;
pub mod geometry;
pub mod mapping;
pub mod particles;
pub mod prime;
pub mod render;
pub mod scene;
pub mod timeline;

pub use analysis::SpectrumAnalyser;
pub use audio::{AnalysisHandle, AudioEngine, FixedSpectrum, FrequencyAnalyzer, SpectrumSource};
pub use bands::{BandEnergy, BandEnergyExtractor};
pub use config::{
    AnalyserConfig, BandSplit, EngineConfig, ParticleConfig, PrimeConfig, RenderConfig,
};
pub use error::{Result, VisualiserError};
pub use geometry::{GeometryCatalog, GeometryVariant};
pub use mapping::{AudioReactiveModulator, ModulationInput, ParameterUpdate, PulseShape};
pub use particles::{Particle, ParticleEffectSystem};
pub use prime::{DominantFrequencyEvent, PrimeActiveState, PrimeDetector};
pub use render::{
    CanvasBackend, EngineObserver, HeadlessBackend, LifecycleState, RenderBackend, ResourceCounts,
    StopHandle, SurfaceSize, TickOutcome, ViewMode, VisualiserEngine,
};
pub use scene::{ColorContext, LiveScene, Rgb, SceneGraph};
pub use timeline::{FrameClock, FrameQueue, FrameScheduler, FrameToken, ManualClock, SystemClock};
