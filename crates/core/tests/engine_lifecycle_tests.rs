use std::{cell::RefCell, rc::Rc, time::Duration};

use harmonic_visualiser_core::{
    render::{FrameView, ResourceId, ResourceKind, ResourceLedger},
    AudioEngine, BandEnergy, CanvasBackend, DominantFrequencyEvent, EngineConfig, EngineObserver,
    FixedSpectrum, FrameQueue, GeometryVariant, HeadlessBackend, LifecycleState, ManualClock,
    RenderBackend, ResourceCounts, Result, StopHandle, SurfaceSize, TickOutcome, VisualiserEngine,
    VisualiserError,
};

const PRIME_SAMPLE_RATE: u32 = 49_664;
const PRIME_BIN: usize = 4;

struct Harness {
    engine: VisualiserEngine,
    queue: FrameQueue,
    clock: ManualClock,
}

impl Harness {
    fn with_backend(backend: Box<dyn RenderBackend>) -> Self {
        let queue = FrameQueue::new();
        let clock = ManualClock::new();
        let config = EngineConfig {
            particles: harmonic_visualiser_core::ParticleConfig {
                seed: Some(42),
                ..Default::default()
            },
            ..EngineConfig::default()
        };
        let engine = VisualiserEngine::new(
            config,
            backend,
            Box::new(queue.clone()),
            Box::new(clock.clone()),
        )
        .unwrap();
        Self {
            engine,
            queue,
            clock,
        }
    }

    fn new() -> Self {
        Self::with_backend(Box::new(HeadlessBackend::new()))
    }

    fn start(&mut self) {
        self.engine.initialize(SurfaceSize::new(320, 240)).unwrap();
        self.engine.set_playing(true);
    }

    /// Advances the clock and fires the pending frame.
    fn tick(&mut self, millis: u64) -> TickOutcome {
        self.clock.advance(Duration::from_millis(millis));
        match self.queue.take_pending() {
            Some(token) => self.engine.on_frame(token),
            None => TickOutcome::Skipped,
        }
    }
}

fn prime_source() -> Box<FixedSpectrum> {
    Box::new(FixedSpectrum::spike(PRIME_SAMPLE_RATE, 1024, PRIME_BIN))
}

fn prime_of(outcome: TickOutcome) -> Option<u32> {
    match outcome {
        TickOutcome::Rendered { prime } => prime.map(|event| event.frequency_hz),
        _ => None,
    }
}

#[test]
fn variant_switches_leave_only_the_active_scene_allocated() {
    let mut harness = Harness::new();
    harness.start();

    for round in 0..4 {
        for variant in GeometryVariant::ALL {
            harness.engine.switch_variant(variant).unwrap();
            harness.tick(16);

            let expected = harness.engine.scene_graph().unwrap().resource_counts();
            assert_eq!(
                harness.engine.live_resources(),
                expected,
                "round {round} variant {variant}"
            );
            assert_eq!(harness.engine.active_variant(), variant);
        }
    }

    harness.engine.dispose();
    assert_eq!(harness.engine.live_resources(), ResourceCounts::default());
}

#[test]
fn prime_event_fires_once_per_cooldown_window() {
    let mut harness = Harness::new();
    harness.engine.connect_audio(prime_source()).unwrap();
    harness.start();

    assert_eq!(prime_of(harness.tick(16)), Some(97));
    let mut fired = 0;
    for _ in 0..50 {
        // 50 x 16 ms stays inside the 1000 ms cooldown.
        if prime_of(harness.tick(16)).is_some() {
            fired += 1;
        }
    }
    assert_eq!(fired, 0);

    harness.clock.advance(Duration::from_millis(400));
    assert_eq!(prime_of(harness.tick(16)), Some(97));
}

#[test]
fn composite_dominant_frequency_never_fires() {
    let mut harness = Harness::new();
    // Bin 50 at 44.1 kHz maps to 1077 Hz.
    harness
        .engine
        .connect_audio(Box::new(FixedSpectrum::spike(44_100, 1024, 50)))
        .unwrap();
    harness.start();

    for _ in 0..10 {
        assert_eq!(prime_of(harness.tick(16)), None);
    }
    assert_eq!(harness.engine.particle_count(), 0);
    assert!(harness.engine.band_energy().bass > 0.0);
}

#[test]
fn burst_particles_return_to_baseline() {
    let mut harness = Harness::new();
    harness.engine.connect_audio(prime_source()).unwrap();
    harness.start();

    assert_eq!(prime_of(harness.tick(16)), Some(97));
    let burst = harness.engine.particle_count();
    assert!((20..=30).contains(&burst));

    harness.engine.disconnect_audio();
    // Longest particle life is 2 s, the prime-active window 3 s.
    for _ in 0..200 {
        harness.tick(16);
    }
    assert_eq!(harness.engine.particle_count(), 0);
    assert!(!harness.engine.is_prime_active());
}

#[test]
fn burst_particles_expire_with_long_frame_gaps() {
    let mut harness = Harness::new();
    harness.engine.connect_audio(prime_source()).unwrap();
    harness.start();

    assert_eq!(prime_of(harness.tick(16)), Some(97));
    assert!(harness.engine.particle_count() > 0);

    harness.engine.disconnect_audio();
    // 2.5 s of wall time at 2 fps outlives every particle.
    for _ in 0..5 {
        harness.tick(500);
    }
    assert_eq!(harness.engine.particle_count(), 0);
}

#[test]
fn source_bin_count_sets_frequency_resolution() {
    let mut harness = Harness::new();
    // Bin 9 of 2048 at 44.1 kHz maps to 97 Hz. Read through a 1024-bin
    // buffer it would land on 194 Hz.
    harness
        .engine
        .connect_audio(Box::new(FixedSpectrum::spike(44_100, 2048, 9)))
        .unwrap();
    harness.start();

    assert_eq!(prime_of(harness.tick(16)), Some(97));
}

struct StopOnPrime {
    primes: Rc<RefCell<Vec<u32>>>,
}

impl EngineObserver for StopOnPrime {
    fn on_prime(&mut self, event: &DominantFrequencyEvent, stop: &StopHandle) {
        self.primes.borrow_mut().push(event.frequency_hz);
        stop.request_stop();
    }
}

#[test]
fn stop_from_observer_halts_the_tick() {
    let mut harness = Harness::new();
    let primes = Rc::new(RefCell::new(Vec::new()));
    harness.engine.subscribe(Box::new(StopOnPrime {
        primes: primes.clone(),
    }));
    harness.engine.connect_audio(prime_source()).unwrap();
    harness.start();

    assert_eq!(harness.tick(16), TickOutcome::Stopped);
    assert_eq!(*primes.borrow(), vec![97]);
    assert_eq!(harness.engine.state(), LifecycleState::Disposed);
    assert_eq!(harness.engine.frames_rendered(), 0);
    assert_eq!(harness.engine.particle_count(), 0);
    assert!(harness.queue.pending().is_none());
    assert_eq!(harness.engine.live_resources().total(), 0);
}

#[test]
fn external_stop_handle_is_honoured_on_next_frame() {
    let mut harness = Harness::new();
    harness.start();
    harness.tick(16);

    let handle = harness.engine.stop_handle();
    handle.request_stop();
    assert!(!handle.is_live());
    // Nothing is torn down until the engine sees the flag.
    assert_eq!(harness.engine.state(), LifecycleState::Running);
    assert!(harness.engine.live_resources().total() > 0);

    assert_eq!(harness.tick(16), TickOutcome::Stopped);
    assert_eq!(harness.engine.frames_rendered(), 1);
    assert_eq!(harness.engine.state(), LifecycleState::Disposed);
}

#[test]
fn stop_cancels_pending_frame_and_is_idempotent() {
    let mut harness = Harness::new();
    harness.start();
    harness.tick(16);
    let token = harness.queue.pending().unwrap();

    harness.engine.stop();
    assert!(harness.queue.pending().is_none());
    assert_eq!(harness.queue.cancelled(), 1);

    harness.engine.dispose();
    harness.engine.stop();
    assert_eq!(harness.engine.on_frame(token), TickOutcome::Stopped);
    assert_eq!(harness.engine.frames_rendered(), 1);
}

#[derive(Default)]
struct BandLog {
    seen: Rc<RefCell<Vec<BandEnergy>>>,
}

impl EngineObserver for BandLog {
    fn on_bands(&mut self, bands: &BandEnergy, _stop: &StopHandle) {
        self.seen.borrow_mut().push(*bands);
    }
}

#[test]
fn pause_suspends_ticks_without_releasing_resources() {
    let mut harness = Harness::new();
    let log = BandLog::default();
    let seen = log.seen.clone();
    harness.engine.subscribe(Box::new(log));
    harness.start();
    harness.tick(16);
    let resources = harness.engine.live_resources();

    harness.engine.set_playing(false);
    assert_eq!(harness.engine.state(), LifecycleState::Paused);
    assert_eq!(harness.tick(16), TickOutcome::Skipped);
    assert_eq!(harness.engine.live_resources(), resources);

    harness.engine.set_playing(true);
    assert!(matches!(harness.tick(16), TickOutcome::Rendered { .. }));
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn resize_keeps_animation_state() {
    let mut harness = Harness::new();
    harness.engine.switch_variant(GeometryVariant::Merkaba).unwrap();
    harness
        .engine
        .connect_audio(Box::new(FixedSpectrum::new(44_100, vec![0.5; 1024])))
        .unwrap();
    harness.start();
    for _ in 0..10 {
        harness.tick(16);
    }
    let before = harness.engine.scene_graph().unwrap().clone();

    harness.engine.resize(SurfaceSize::new(1280, 720));
    let after = harness.engine.scene_graph().unwrap();
    assert_eq!(&before, after);
    assert_eq!(
        harness.engine.camera().unwrap().surface(),
        SurfaceSize::new(1280, 720)
    );

    harness.tick(16);
    let spun = harness.engine.scene_graph().unwrap();
    let id = spun
        .ids_with(harmonic_visualiser_core::scene::NodeRole::TetraUp)
        .next()
        .unwrap();
    assert!(
        spun.node(id).unwrap().transform.rotation.y.abs()
            > before.node(id).unwrap().transform.rotation.y.abs()
    );
}

#[test]
fn unusable_canvas_falls_back_to_headless() {
    let mut harness = Harness::with_backend(Box::new(CanvasBackend::new()));
    harness.engine.initialize(SurfaceSize::new(0, 0)).unwrap();
    assert_eq!(harness.engine.backend_name(), "headless");
    assert_eq!(harness.engine.state(), LifecycleState::Ready);

    harness.engine.set_playing(true);
    assert!(matches!(harness.tick(16), TickOutcome::Rendered { .. }));
    let expected = harness.engine.scene_graph().unwrap().resource_counts();
    assert_eq!(harness.engine.live_resources(), expected);
}

/// Backend whose surface is lost after the first frame.
#[derive(Default)]
struct LosingBackend {
    ledger: ResourceLedger,
    draws: u32,
}

impl RenderBackend for LosingBackend {
    fn name(&self) -> &'static str {
        "losing"
    }

    fn configure(&mut self, _surface: SurfaceSize) -> Result<()> {
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
        self.draws += 1;
        if self.draws > 1 {
            return Err(VisualiserError::SurfaceUnavailable("context lost".into()));
        }
        Ok(())
    }
}

#[test]
fn lost_surface_mid_run_moves_scene_to_placeholder() {
    let mut harness = Harness::with_backend(Box::new(LosingBackend::default()));
    harness.start();
    harness.tick(16);
    assert_eq!(harness.engine.backend_name(), "losing");

    assert!(matches!(harness.tick(16), TickOutcome::Rendered { .. }));
    assert_eq!(harness.engine.backend_name(), "headless");
    let expected = harness.engine.scene_graph().unwrap().resource_counts();
    assert_eq!(harness.engine.live_resources(), expected);

    assert!(matches!(harness.tick(16), TickOutcome::Rendered { .. }));
    assert_eq!(harness.engine.state(), LifecycleState::Running);
}

#[test]
fn analyser_feed_drives_bands() {
    let config = EngineConfig::default();
    let audio = AudioEngine::new(config.analyser.sample_rate, &config.analyser).unwrap();
    let mut harness = Harness::new();
    harness
        .engine
        .connect_audio(Box::new(audio.connect().unwrap()))
        .unwrap();
    harness.start();

    harness.tick(16);
    assert_eq!(harness.engine.band_energy(), BandEnergy::SILENT);

    let rate = config.analyser.sample_rate as f32;
    let tone: Vec<f32> = (0..4096)
        .map(|i| (std::f32::consts::TAU * 220.0 * i as f32 / rate).sin() * 0.5)
        .collect();
    audio.push_samples(&tone).unwrap();
    harness.tick(16);
    assert!(harness.engine.band_energy().bass > 0.0);
}
