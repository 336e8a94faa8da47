use std::{cell::Cell, fmt, path::Path, rc::Rc, time::Duration};

use glam::Vec2;
use tracing::{debug, info, trace, warn};

use crate::{
    audio::{FrequencyAnalyzer, SpectrumSource},
    bands::{BandEnergy, BandEnergyExtractor},
    config::EngineConfig,
    geometry::{GeometryCatalog, GeometryVariant},
    mapping::{AudioReactiveModulator, ModulationInput, PulseShape},
    particles::ParticleEffectSystem,
    prime::{DominantFrequencyEvent, PrimeActiveState, PrimeDetector},
    render::{
        Camera, FrameView, HeadlessBackend, RenderBackend, ResourceCounts, SurfaceSize, ViewMode,
    },
    scene::{ColorContext, LiveScene, SceneGraph},
    timeline::{FrameClock, FrameScheduler, FrameToken},
    Result, VisualiserError,
};

/// Longest elapsed time a single tick feeds into rotation. Longer gaps (a
/// stalled host, a debugger pause) are clamped so the geometry does not jump.
/// Particles age by the real elapsed time so bursts still expire on schedule.
pub const MAX_TICK_SECONDS: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Ready,
    Running,
    Paused,
    Disposed,
}

impl LifecycleState {
    pub fn name(self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Ready => "ready",
            LifecycleState::Running => "running",
            LifecycleState::Paused => "paused",
            LifecycleState::Disposed => "disposed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Liveness flag shared between the engine and anyone allowed to stop it.
/// Once stopped it never becomes live again.
///
/// Stopping through the handle is asynchronous: resources stay allocated
/// until the engine next looks at the flag, which happens only inside
/// [`VisualiserEngine::on_frame`]. Hosts that need teardown to have happened
/// when the call returns use [`VisualiserEngine::stop`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    live: Rc<Cell<bool>>,
}

impl StopHandle {
    fn new() -> Self {
        Self {
            live: Rc::new(Cell::new(true)),
        }
    }

    /// Marks the engine for teardown. The engine checks the flag at the start
    /// of every tick and between its stages; the first check that sees it
    /// disposes. Nothing is released by this call itself.
    pub fn request_stop(&self) {
        self.live.set(false);
    }

    pub fn is_live(&self) -> bool {
        self.live.get()
    }
}

/// Host callbacks for per-tick output.
pub trait EngineObserver {
    /// Band energies computed this tick.
    fn on_bands(&mut self, _bands: &BandEnergy, _stop: &StopHandle) {}

    /// A prime dominant frequency fired this tick.
    fn on_prime(&mut self, _event: &DominantFrequencyEvent, _stop: &StopHandle) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The full pipeline ran and the next frame was requested.
    Rendered {
        prime: Option<DominantFrequencyEvent>,
    },
    /// Stale token or not running; nothing changed.
    Skipped,
    /// The engine is (now) disposed.
    Stopped,
}

/// Owns the output surface, the active scene and every per-tick stage, and
/// drives them through the lifecycle
/// `Uninitialized -> Ready -> Running <-> Paused -> Disposed`.
pub struct VisualiserEngine {
    config: EngineConfig,
    state: LifecycleState,
    catalog: GeometryCatalog,
    analyzer: FrequencyAnalyzer,
    extractor: BandEnergyExtractor,
    detector: PrimeDetector,
    prime_active: PrimeActiveState,
    modulator: AudioReactiveModulator,
    particles: ParticleEffectSystem,
    backend: Box<dyn RenderBackend>,
    scheduler: Box<dyn FrameScheduler>,
    clock: Box<dyn FrameClock>,
    camera: Option<Camera>,
    surface: Option<SurfaceSize>,
    scene: Option<LiveScene>,
    variant: GeometryVariant,
    theme: String,
    colors: ColorContext,
    bands: BandEnergy,
    pending: Option<FrameToken>,
    last_tick: Option<Duration>,
    playing: bool,
    liveness: StopHandle,
    observers: Vec<Box<dyn EngineObserver>>,
    frames_rendered: u64,
}

impl VisualiserEngine {
    pub fn new(
        config: EngineConfig,
        backend: Box<dyn RenderBackend>,
        scheduler: Box<dyn FrameScheduler>,
        clock: Box<dyn FrameClock>,
    ) -> Result<Self> {
        config.validate()?;
        let theme = String::from("cosmic");
        Ok(Self {
            catalog: GeometryCatalog::standard(),
            analyzer: FrequencyAnalyzer::new(&config.analyser),
            extractor: BandEnergyExtractor::new(config.bands.clone()),
            detector: PrimeDetector::new(&config.prime),
            prime_active: PrimeActiveState::new(config.prime.active_window()),
            modulator: AudioReactiveModulator::new(PulseShape::from(&config.prime)),
            particles: ParticleEffectSystem::new(config.particles.clone()),
            config,
            state: LifecycleState::Uninitialized,
            backend,
            scheduler,
            clock,
            camera: None,
            surface: None,
            scene: None,
            variant: GeometryVariant::default(),
            colors: ColorContext::for_theme(&theme),
            theme,
            bands: BandEnergy::SILENT,
            pending: None,
            last_tick: None,
            playing: false,
            liveness: StopHandle::new(),
            observers: Vec::new(),
            frames_rendered: 0,
        })
    }

    /// Replaces the geometry catalog. Only allowed before initialization.
    pub fn with_catalog(mut self, catalog: GeometryCatalog) -> Self {
        if self.state == LifecycleState::Uninitialized {
            self.catalog = catalog;
        }
        self
    }

    fn invalid(&self, operation: &'static str) -> VisualiserError {
        VisualiserError::InvalidState {
            operation,
            state: self.state.name(),
        }
    }

    /// Sets up the output surface, camera and base scene. Surface failures fall
    /// back to the headless placeholder instead of failing.
    pub fn initialize(&mut self, surface: SurfaceSize) -> Result<()> {
        if self.state != LifecycleState::Uninitialized {
            return Err(self.invalid("initialize"));
        }
        if !self.catalog.contains(self.variant) {
            return Err(VisualiserError::UnknownVariant(self.variant.to_string()));
        }

        if let Err(err) = self.backend.configure(surface) {
            warn!(backend = self.backend.name(), %err, "output surface unavailable");
            self.install_fallback(surface);
        }
        self.surface = Some(surface);
        self.camera = Some(Camera::new(
            self.config.render.view_mode,
            self.config.render.field_of_view_deg,
            surface,
        ));
        self.rebuild_scene(self.variant)?;
        self.state = LifecycleState::Ready;
        debug!(
            width = surface.width,
            height = surface.height,
            backend = self.backend.name(),
            "engine ready"
        );

        if self.playing {
            self.resume();
        }
        Ok(())
    }

    /// Swaps to the headless placeholder, moving the live scene across.
    fn install_fallback(&mut self, surface: SurfaceSize) {
        if self.backend.is_fallback() {
            return;
        }
        let mut fallback: Box<dyn RenderBackend> = Box::new(HeadlessBackend::new());
        if let Err(err) = fallback.configure(surface) {
            warn!(%err, "fallback backend rejected surface");
        }
        if let Some(scene) = self.scene.as_mut() {
            scene.rebind(self.backend.as_mut(), fallback.as_mut());
        }
        self.backend.shutdown();
        warn!(
            from = self.backend.name(),
            to = fallback.name(),
            "falling back to static placeholder rendering"
        );
        self.backend = fallback;
    }

    /// Disposes the current scene completely, then constructs and attaches
    /// `variant`.
    fn rebuild_scene(&mut self, variant: GeometryVariant) -> Result<()> {
        if let Some(mut previous) = self.scene.take() {
            previous.dispose(self.backend.as_mut());
        }
        let graph = self.catalog.build(variant, &self.colors)?;
        self.scene = Some(LiveScene::attach(variant, graph, self.backend.as_mut()));
        self.variant = variant;
        Ok(())
    }

    pub fn connect_audio(&mut self, source: Box<dyn SpectrumSource>) -> Result<()> {
        if self.state == LifecycleState::Disposed {
            return Err(self.invalid("connect audio"));
        }
        self.analyzer.connect(source);
        Ok(())
    }

    pub fn disconnect_audio(&mut self) {
        self.analyzer.disconnect();
    }

    /// Host playback flag. Playing drives `Ready`/`Paused` into `Running`,
    /// not playing pauses a running engine.
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
        match (self.state, playing) {
            (LifecycleState::Ready | LifecycleState::Paused, true) => self.resume(),
            (LifecycleState::Running, false) => self.pause(),
            _ => {}
        }
    }

    /// Suspends ticks and cancels the pending frame; resources are retained.
    pub fn pause(&mut self) {
        if self.state != LifecycleState::Running {
            return;
        }
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel_frame(token);
        }
        self.last_tick = None;
        self.state = LifecycleState::Paused;
        debug!("engine paused");
    }

    pub fn resume(&mut self) {
        if !matches!(self.state, LifecycleState::Ready | LifecycleState::Paused) {
            return;
        }
        self.state = LifecycleState::Running;
        self.last_tick = None;
        self.pending = Some(self.scheduler.request_frame());
        debug!("engine running");
    }

    /// Display-refresh callback for `token`. Runs one full tick when the token
    /// is the one the engine is waiting for and the engine is running.
    pub fn on_frame(&mut self, token: FrameToken) -> TickOutcome {
        if self.state == LifecycleState::Disposed {
            return TickOutcome::Stopped;
        }
        if !self.liveness.is_live() {
            self.dispose();
            return TickOutcome::Stopped;
        }
        if self.pending != Some(token) {
            trace!(token = token.0, "stale frame skipped");
            return TickOutcome::Skipped;
        }
        self.pending = None;
        if self.state != LifecycleState::Running {
            return TickOutcome::Skipped;
        }

        let now = self.clock.now();
        let elapsed = self
            .last_tick
            .map(|last| now.saturating_sub(last).as_secs_f32())
            .unwrap_or(0.0);
        let dt = elapsed.min(MAX_TICK_SECONDS);
        self.last_tick = Some(now);

        let spectrum = self.analyzer.pull();
        let bands = self.extractor.extract(spectrum);
        self.bands = bands;
        for observer in &mut self.observers {
            observer.on_bands(&bands, &self.liveness);
        }
        if !self.liveness.is_live() {
            self.dispose();
            return TickOutcome::Stopped;
        }

        let event = self.detector.detect(
            self.analyzer.spectrum(),
            self.analyzer.sample_rate(),
            now,
        );
        if let Some(event) = &event {
            self.prime_active.trigger(event);
            self.particles.spawn_burst(Vec2::ZERO, self.colors.emissive);
            for observer in &mut self.observers {
                observer.on_prime(event, &self.liveness);
            }
            if !self.liveness.is_live() {
                self.dispose();
                return TickOutcome::Stopped;
            }
        }

        let pulse = self.prime_active.pulse(now);
        if let Some(scene) = self.scene.as_mut() {
            let variant = scene.variant();
            self.modulator.modulate(
                variant,
                scene.graph_mut(),
                &ModulationInput { bands, dt, pulse },
            );
        }
        self.particles.advance(elapsed);

        self.render();
        self.frames_rendered += 1;
        trace!(frame = self.frames_rendered, dt, elapsed, "tick");

        self.pending = Some(self.scheduler.request_frame());
        TickOutcome::Rendered { prime: event }
    }

    fn render(&mut self) {
        let (Some(scene), Some(camera)) = (self.scene.as_ref(), self.camera.as_ref()) else {
            return;
        };
        let frame = FrameView {
            scene: scene.graph(),
            particles: self.particles.particles(),
            camera,
            background: self.colors.background(),
        };
        if let Err(err) = self.backend.draw(&frame) {
            warn!(backend = self.backend.name(), %err, "draw failed");
            if let Some(surface) = self.surface {
                self.install_fallback(surface);
            }
        }
    }

    /// Synchronous variant switch: the current variant is fully disposed before
    /// the new one is attached.
    pub fn switch_variant(&mut self, variant: GeometryVariant) -> Result<()> {
        if self.state == LifecycleState::Disposed {
            return Err(self.invalid("switch variant"));
        }
        if !self.catalog.contains(variant) {
            return Err(VisualiserError::UnknownVariant(variant.to_string()));
        }
        if self.state == LifecycleState::Uninitialized {
            self.variant = variant;
            return Ok(());
        }
        self.rebuild_scene(variant)?;
        info!(variant = %variant, "geometry variant switched");
        Ok(())
    }

    /// Applies a theme or chakra tag. The active variant is rebuilt with the
    /// new palette.
    pub fn set_theme(&mut self, tag: &str) -> Result<()> {
        if self.state == LifecycleState::Disposed {
            return Err(self.invalid("set theme"));
        }
        self.theme = tag.to_string();
        self.colors = ColorContext::for_theme(tag);
        if self.scene.is_some() {
            self.rebuild_scene(self.variant)?;
        }
        debug!(theme = tag, "theme applied");
        Ok(())
    }

    /// Recomputes surface size and projection. Animation state is untouched.
    pub fn resize(&mut self, surface: SurfaceSize) {
        match self.state {
            LifecycleState::Disposed => {
                debug!("resize after dispose ignored");
                return;
            }
            LifecycleState::Uninitialized => return,
            _ => {}
        }
        if let Err(err) = self.backend.configure(surface) {
            warn!(backend = self.backend.name(), %err, "resize rejected by surface");
            self.install_fallback(surface);
        }
        self.surface = Some(surface);
        if let Some(camera) = self.camera.as_mut() {
            camera.resize(surface);
        }
        debug!(width = surface.width, height = surface.height, "resized");
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.config.render.view_mode = mode;
        if let Some(camera) = self.camera.as_mut() {
            camera.set_mode(mode);
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn EngineObserver>) {
        if self.state != LifecycleState::Disposed {
            self.observers.push(observer);
        }
    }

    /// Host unmount. Same as [`VisualiserEngine::dispose`]: synchronous, so
    /// every resource is released before this returns.
    pub fn stop(&mut self) {
        self.dispose();
    }

    /// Cancels the pending frame and releases every resource. Terminal and
    /// idempotent.
    pub fn dispose(&mut self) {
        if self.state == LifecycleState::Disposed {
            debug!("engine already disposed");
            return;
        }
        self.liveness.request_stop();
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel_frame(token);
        }
        let released = match self.scene.take() {
            Some(mut scene) => scene.dispose(self.backend.as_mut()),
            None => 0,
        };
        self.particles.clear();
        self.prime_active.clear();
        self.detector.reset();
        self.analyzer.disconnect();
        self.observers.clear();
        self.backend.shutdown();
        self.bands = BandEnergy::SILENT;
        self.state = LifecycleState::Disposed;
        debug!(released, "engine disposed");
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        if self.scene.is_none() {
            return Err(self.invalid("save snapshot"));
        }
        self.backend.save_snapshot(path)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Band energies of the last tick.
    pub fn band_energy(&self) -> BandEnergy {
        self.bands
    }

    pub fn active_variant(&self) -> GeometryVariant {
        self.variant
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn colors(&self) -> ColorContext {
        self.colors
    }

    pub fn scene_graph(&self) -> Option<&SceneGraph> {
        self.scene.as_ref().map(LiveScene::graph)
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Resources currently allocated on the backend.
    pub fn live_resources(&self) -> ResourceCounts {
        self.backend.live_resources()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn pending_frame(&self) -> Option<FrameToken> {
        self.pending
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.liveness.clone()
    }

    pub fn is_prime_active(&self) -> bool {
        self.prime_active.is_active(self.clock.now())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl fmt::Debug for VisualiserEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisualiserEngine")
            .field("state", &self.state)
            .field("variant", &self.variant)
            .field("theme", &self.theme)
            .field("backend", &self.backend.name())
            .field("pending", &self.pending)
            .field("frames_rendered", &self.frames_rendered)
            .finish_non_exhaustive()
    }
}

impl Drop for VisualiserEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        timeline::{FrameQueue, ManualClock},
        FixedSpectrum,
    };

    fn engine() -> (VisualiserEngine, FrameQueue, ManualClock) {
        let queue = FrameQueue::new();
        let clock = ManualClock::new();
        let engine = VisualiserEngine::new(
            EngineConfig::default(),
            Box::new(HeadlessBackend::new()),
            Box::new(queue.clone()),
            Box::new(clock.clone()),
        )
        .unwrap();
        (engine, queue, clock)
    }

    #[test]
    fn lifecycle_walks_through_every_state() {
        let (mut engine, queue, _) = engine();
        assert_eq!(engine.state(), LifecycleState::Uninitialized);

        engine.initialize(SurfaceSize::new(320, 240)).unwrap();
        assert_eq!(engine.state(), LifecycleState::Ready);
        assert!(queue.pending().is_none());

        engine.set_playing(true);
        assert_eq!(engine.state(), LifecycleState::Running);
        assert!(queue.pending().is_some());

        engine.set_playing(false);
        assert_eq!(engine.state(), LifecycleState::Paused);
        assert!(queue.pending().is_none());

        engine.set_playing(true);
        assert_eq!(engine.state(), LifecycleState::Running);

        engine.dispose();
        assert_eq!(engine.state(), LifecycleState::Disposed);
        assert!(queue.pending().is_none());
    }

    #[test]
    fn initialize_twice_is_rejected() {
        let (mut engine, _, _) = engine();
        engine.initialize(SurfaceSize::new(10, 10)).unwrap();
        let err = engine.initialize(SurfaceSize::new(10, 10)).unwrap_err();
        assert!(matches!(err, VisualiserError::InvalidState { .. }));
    }

    #[test]
    fn playing_before_initialize_starts_running_once_ready() {
        let (mut engine, queue, _) = engine();
        engine.set_playing(true);
        assert_eq!(engine.state(), LifecycleState::Uninitialized);
        engine.initialize(SurfaceSize::new(64, 64)).unwrap();
        assert_eq!(engine.state(), LifecycleState::Running);
        assert_eq!(queue.requested(), 1);
    }

    #[test]
    fn silent_source_renders_idle_frames() {
        let (mut engine, queue, clock) = engine();
        engine.initialize(SurfaceSize::new(64, 64)).unwrap();
        engine.set_playing(true);

        for _ in 0..5 {
            clock.advance(Duration::from_millis(16));
            let token = queue.take_pending().unwrap();
            assert_eq!(
                engine.on_frame(token),
                TickOutcome::Rendered { prime: None }
            );
        }
        assert_eq!(engine.band_energy(), BandEnergy::SILENT);
        assert_eq!(engine.frames_rendered(), 5);
        assert_eq!(engine.particle_count(), 0);
    }

    #[test]
    fn stale_token_is_skipped() {
        let (mut engine, queue, _) = engine();
        engine.initialize(SurfaceSize::new(64, 64)).unwrap();
        engine.set_playing(true);
        let token = queue.take_pending().unwrap();
        assert!(matches!(
            engine.on_frame(token),
            TickOutcome::Rendered { .. }
        ));
        assert_eq!(engine.on_frame(token), TickOutcome::Skipped);
        assert_eq!(engine.frames_rendered(), 1);
    }

    #[test]
    fn prime_spike_bursts_particles() {
        let (mut engine, queue, clock) = engine();
        engine
            .connect_audio(Box::new(FixedSpectrum::spike(49_664, 1024, 4)))
            .unwrap();
        engine.initialize(SurfaceSize::new(64, 64)).unwrap();
        engine.set_playing(true);

        clock.advance(Duration::from_millis(16));
        let token = queue.take_pending().unwrap();
        let TickOutcome::Rendered { prime: Some(event) } = engine.on_frame(token) else {
            panic!("expected a prime event");
        };
        assert_eq!(event.frequency_hz, 97);
        assert!(engine.is_prime_active());
        assert!((20..=30).contains(&engine.particle_count()));
        assert!(engine.scene_graph().unwrap().modifier().pulse_scale.is_some());
    }

    #[test]
    fn theme_change_rebuilds_without_leaks() {
        let (mut engine, _, _) = engine();
        engine.initialize(SurfaceSize::new(64, 64)).unwrap();
        let before = engine.live_resources();
        engine.set_theme("crown").unwrap();
        assert_eq!(engine.theme(), "crown");
        assert_eq!(engine.colors(), ColorContext::for_theme("crown"));
        assert_eq!(engine.live_resources(), before);
    }

    #[test]
    fn operations_after_dispose_are_rejected() {
        let (mut engine, _, _) = engine();
        engine.initialize(SurfaceSize::new(64, 64)).unwrap();
        engine.dispose();
        assert!(engine.switch_variant(GeometryVariant::Merkaba).is_err());
        assert!(engine.set_theme("heart").is_err());
        engine.resize(SurfaceSize::new(10, 10));
        assert_eq!(engine.live_resources().total(), 0);
    }
}
