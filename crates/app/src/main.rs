use std::{
    cell::Cell,
    f32::consts::TAU,
    path::{Path, PathBuf},
    rc::Rc,
    thread,
    time::Duration,
};

use clap::{Parser, Subcommand};
use harmonic_visualiser_core::{
    scene::THEMES, AudioEngine, CanvasBackend, DominantFrequencyEvent, EngineConfig,
    EngineObserver, FrameClock, FrameQueue, GeometryVariant, HeadlessBackend, ManualClock,
    RenderBackend, StopHandle, SurfaceSize, SystemClock, TickOutcome, VisualiserEngine,
};
use tracing_subscriber::EnvFilter;

fn main() -> harmonic_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            list();
            Ok(())
        }
        Commands::Live(args) => run_live(&args),
        Commands::Snapshot(args) => run_snapshot(&args),
    }
}

fn list() {
    println!("variants:");
    for variant in GeometryVariant::ALL {
        println!("  {variant}");
    }
    println!("themes:");
    for theme in THEMES {
        println!("  {theme}");
    }
}

fn load_config(path: Option<&Path>) -> harmonic_visualiser_core::Result<EngineConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading engine config");
            EngineConfig::from_path(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Sine generator feeding the analyser in refresh-sized blocks.
struct ToneFeed {
    audio: AudioEngine,
    frequency_hz: f32,
    sample_rate: f32,
    position: u64,
}

impl ToneFeed {
    fn new(audio: AudioEngine, frequency_hz: f32, sample_rate: u32) -> Self {
        Self {
            audio,
            frequency_hz,
            sample_rate: sample_rate as f32,
            position: 0,
        }
    }

    fn push(&mut self, elapsed: Duration) -> harmonic_visualiser_core::Result<()> {
        let count = (elapsed.as_secs_f32() * self.sample_rate).round() as usize;
        let block: Vec<f32> = (0..count as u64)
            .map(|i| {
                let t = (self.position + i) as f32 / self.sample_rate;
                (TAU * self.frequency_hz * t).sin() * 0.5
            })
            .collect();
        self.position += count as u64;
        self.audio.push_samples(&block)
    }
}

/// Logs prime events and counts them for the summary line.
struct PrimeLogger {
    primes: Rc<Cell<u32>>,
}

impl EngineObserver for PrimeLogger {
    fn on_prime(&mut self, event: &DominantFrequencyEvent, _stop: &StopHandle) {
        self.primes.set(self.primes.get() + 1);
        tracing::info!(
            frequency_hz = event.frequency_hz,
            at_ms = event.timestamp.as_millis() as u64,
            "prime resonance"
        );
    }
}

fn build_engine(
    config: EngineConfig,
    backend: Box<dyn RenderBackend>,
    queue: &FrameQueue,
    clock: Box<dyn FrameClock>,
    variant: GeometryVariant,
    theme: &str,
    tone_hz: f32,
) -> harmonic_visualiser_core::Result<(VisualiserEngine, ToneFeed)> {
    let audio = AudioEngine::new(config.analyser.sample_rate, &config.analyser)?;
    let handle = audio.connect()?;
    let feed = ToneFeed::new(audio, tone_hz, config.analyser.sample_rate);

    let mut engine = VisualiserEngine::new(config, backend, Box::new(queue.clone()), clock)?;
    engine.switch_variant(variant)?;
    engine.set_theme(theme)?;
    engine.connect_audio(Box::new(handle))?;
    Ok((engine, feed))
}

fn run_live(args: &LiveArgs) -> harmonic_visualiser_core::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let refresh = config.render.refresh_interval();
    tracing::info!(
        variant = %args.variant,
        theme = %args.theme,
        frames = args.frames,
        tone_hz = args.tone_hz,
        "starting live mode"
    );

    let queue = FrameQueue::new();
    let (mut engine, mut feed) = build_engine(
        config,
        Box::new(HeadlessBackend::new()),
        &queue,
        Box::new(SystemClock::start()),
        args.variant,
        &args.theme,
        args.tone_hz,
    )?;

    let primes = Rc::new(Cell::new(0));
    engine.subscribe(Box::new(PrimeLogger {
        primes: primes.clone(),
    }));
    engine.initialize(SurfaceSize::new(args.width, args.height))?;
    engine.set_playing(true);

    let mut rendered = 0u32;
    while rendered < args.frames {
        thread::sleep(refresh);
        feed.push(refresh)?;

        let Some(token) = queue.take_pending() else {
            break;
        };
        match engine.on_frame(token) {
            TickOutcome::Rendered { .. } => rendered += 1,
            TickOutcome::Skipped => continue,
            TickOutcome::Stopped => break,
        }

        if let Some(every) = args.cycle.filter(|every| *every > 0) {
            if rendered % every == 0 {
                engine.switch_variant(engine.active_variant().next())?;
            }
        }
        if rendered % 60 == 0 {
            let bands = engine.band_energy();
            tracing::debug!(
                bass = bands.bass,
                mid_low = bands.mid_low,
                mid_high = bands.mid_high,
                treble = bands.treble,
                particles = engine.particle_count(),
                "band energy"
            );
        }
    }

    engine.stop();
    tracing::info!(
        frames = rendered,
        primes = primes.get(),
        leaked = engine.live_resources().total(),
        "live mode finished"
    );
    Ok(())
}

fn run_snapshot(args: &SnapshotArgs) -> harmonic_visualiser_core::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let refresh = config.render.refresh_interval();
    tracing::info!(
        variant = %args.variant,
        theme = %args.theme,
        output = ?args.output,
        "rendering snapshot"
    );

    let queue = FrameQueue::new();
    let clock = ManualClock::new();
    let (mut engine, mut feed) = build_engine(
        config,
        Box::new(CanvasBackend::new()),
        &queue,
        Box::new(clock.clone()),
        args.variant,
        &args.theme,
        args.tone_hz,
    )?;

    engine.initialize(SurfaceSize::new(args.width, args.height))?;
    engine.set_playing(true);
    for _ in 0..args.warmup {
        clock.advance(refresh);
        feed.push(refresh)?;
        match queue.take_pending() {
            Some(token) => {
                engine.on_frame(token);
            }
            None => break,
        }
    }

    engine.save_snapshot(&args.output)?;
    engine.stop();
    tracing::info!(output = ?args.output, "snapshot written");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive sacred geometry visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List geometry variants and colour themes.
    List,
    /// Drive the engine in real time from a synthetic tone.
    Live(LiveArgs),
    /// Render a few frames into a raster canvas and save a PNG.
    Snapshot(SnapshotArgs),
}

#[derive(clap::Args, Debug)]
struct LiveArgs {
    #[arg(long, default_value_t = GeometryVariant::FlowerOfLife)]
    variant: GeometryVariant,
    #[arg(long, default_value = "cosmic")]
    theme: String,
    /// Number of frames to render before stopping.
    #[arg(long, default_value_t = 600)]
    frames: u32,
    /// Frequency of the synthetic input tone. At the default analyser
    /// resolution 151 Hz lands on a prime bin frequency.
    #[arg(long, default_value_t = 151.0)]
    tone_hz: f32,
    /// Switch to the next variant every N frames.
    #[arg(long)]
    cycle: Option<u32>,
    #[arg(long, default_value_t = 1280)]
    width: u32,
    #[arg(long, default_value_t = 720)]
    height: u32,
    /// JSON engine configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct SnapshotArgs {
    #[arg(long, default_value_t = GeometryVariant::FlowerOfLife)]
    variant: GeometryVariant,
    #[arg(long, default_value = "cosmic")]
    theme: String,
    #[arg(long, default_value_t = 800)]
    width: u32,
    #[arg(long, default_value_t = 800)]
    height: u32,
    /// Frames simulated before the capture.
    #[arg(long, default_value_t = 30)]
    warmup: u32,
    #[arg(long, default_value_t = 220.0)]
    tone_hz: f32,
    #[arg(long, short)]
    output: PathBuf,
    /// JSON engine configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}
