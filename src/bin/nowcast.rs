use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use nowcast::{ComparisonMode, Engine, EngineConfig, PredictMode, playback::DEFAULT_REFRESH};

#[derive(Parser, Debug)]
#[command(name = "nowcast", version)]
struct Cli {
    /// Engine config JSON; flags below override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict future frames and write them as PNGs.
    Predict(PredictArgs),
    /// Render the comparison view for one predicted frame.
    Compare(CompareArgs),
    /// Predict, then play the sequence back for a while.
    Play(PlayArgs),
}

#[derive(Parser, Debug)]
struct SourceArgs {
    /// Directory of observed frames (PNG/JPEG, ordered by name).
    #[arg(long)]
    inputs: PathBuf,

    /// Directory of ground-truth frames.
    #[arg(long)]
    truth: Option<PathBuf>,

    /// Where predictions come from.
    #[arg(long, value_enum)]
    mode: Option<ModeChoice>,

    /// Model API base URL (remote mode).
    #[arg(long)]
    endpoint: Option<String>,

    /// Variable name sent to the model API.
    #[arg(long)]
    variable: Option<String>,

    /// Number of frames to predict.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    horizon: Option<u32>,
}

#[derive(Parser, Debug)]
struct PredictArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output directory for `pred_XX.png`.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct CompareArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Use existing predicted frames instead of predicting.
    #[arg(long)]
    predictions: Option<PathBuf>,

    /// Output PNG for the comparison raster.
    #[arg(long)]
    out: PathBuf,

    /// Also write the observed (left) raster here.
    #[arg(long)]
    left_out: Option<PathBuf>,

    #[arg(long = "compare", value_enum)]
    compare: Option<CompareChoice>,

    /// Overlay opacity in [0, 1].
    #[arg(long)]
    opacity: Option<f32>,

    /// Diff noise threshold.
    #[arg(long)]
    threshold: Option<f32>,

    /// Predicted frame index to compare.
    #[arg(long, default_value_t = 0)]
    index: usize,
}

#[derive(Parser, Debug)]
struct PlayArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// How long to play.
    #[arg(long, default_value_t = 3.0)]
    seconds: f64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeChoice {
    Mock,
    Remote,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompareChoice {
    Side,
    Overlay,
    Diff,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    match cli.cmd {
        Command::Predict(args) => cmd_predict(config, args),
        Command::Compare(args) => cmd_compare(config, args),
        Command::Play(args) => cmd_play(config, args),
    }
}

fn apply_source(mut config: EngineConfig, args: &SourceArgs) -> EngineConfig {
    if let Some(mode) = args.mode {
        config.predict_mode = match mode {
            ModeChoice::Mock => PredictMode::Mock,
            ModeChoice::Remote => PredictMode::Remote,
        };
    }
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(variable) = &args.variable {
        config.variable = variable.clone();
    }
    if let Some(horizon) = args.horizon {
        config.horizon = horizon;
    }
    config
}

fn load_engine(config: EngineConfig, args: &SourceArgs) -> anyhow::Result<Engine> {
    let config = apply_source(config, args);
    let mut engine = Engine::new(config)?;

    let paths = nowcast::ingest::list_images(&args.inputs)?;
    let n = engine.load_inputs(&paths)?;
    if n == 0 {
        anyhow::bail!("no PNG/JPEG frames found in '{}'", args.inputs.display());
    }
    if let Some(dir) = &args.truth {
        let paths = nowcast::ingest::list_images(dir)?;
        engine.load_truth(&paths)?;
    }
    Ok(engine)
}

fn predict(engine: &mut Engine) -> anyhow::Result<()> {
    let result = engine.run_prediction();
    eprintln!("{}", engine.status());
    result?;
    Ok(())
}

fn write_png(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("write png '{}'", path.display()))
}

fn cmd_predict(config: EngineConfig, args: PredictArgs) -> anyhow::Result<()> {
    let mut engine = load_engine(config, &args.source)?;
    predict(&mut engine)?;

    for (i, frame) in engine.predictions().iter().enumerate() {
        let decoded = frame.decode_with_timeout(engine.config().decode_timeout())?;
        let png = nowcast::Frame::from_decoded(&decoded)?;
        let path = args.out.join(format!("pred_{i:02}.png"));
        write_png(&path, png.bytes())?;
    }
    eprintln!(
        "wrote {} frame(s) to {}",
        engine.predictions().len(),
        args.out.display()
    );
    Ok(())
}

fn cmd_compare(config: EngineConfig, args: CompareArgs) -> anyhow::Result<()> {
    let mut engine = load_engine(config, &args.source)?;

    match &args.predictions {
        Some(dir) => {
            let paths = nowcast::ingest::list_images(dir)?;
            let frames = nowcast::ingest::read_frames(&paths)?;
            engine.run_prediction_with(&Preloaded(frames))?;
        }
        None => predict(&mut engine)?,
    }

    if let Some(choice) = args.compare {
        engine.set_compare_mode(match choice {
            CompareChoice::Side => ComparisonMode::Side,
            CompareChoice::Overlay => ComparisonMode::Overlay,
            CompareChoice::Diff => ComparisonMode::Diff,
        });
    }
    if let Some(opacity) = args.opacity {
        engine.set_opacity(opacity)?;
    }
    if let Some(threshold) = args.threshold {
        engine.set_diff_threshold(threshold)?;
    }
    engine.seek(args.index);

    let (left, right) = engine.render()?;
    write_png(&args.out, &right.to_png()?)?;
    if let Some(path) = &args.left_out {
        write_png(path, &left.to_png()?)?;
    }

    if let Some(m) = engine.metrics()? {
        println!("score={:.4} mse={:.2}", m.score, m.mse);
    }
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_play(config: EngineConfig, args: PlayArgs) -> anyhow::Result<()> {
    if !args.seconds.is_finite() || args.seconds <= 0.0 {
        anyhow::bail!("--seconds must be a positive number");
    }
    let mut engine = load_engine(config, &args.source)?;
    predict(&mut engine)?;
    engine.play(Instant::now());

    let engine = Arc::new(Mutex::new(engine));
    let shared = Arc::clone(&engine);
    let mut timer = nowcast::PlaybackTimer::spawn(DEFAULT_REFRESH, move |now| {
        let Ok(mut engine) = shared.lock() else {
            return;
        };
        if let Some(cursor) = engine.tick(now) {
            match engine.metrics() {
                Ok(Some(m)) => tracing::info!(cursor, score = m.score, mse = m.mse, "advance"),
                Ok(None) => tracing::info!(cursor, "advance"),
                Err(err) => tracing::warn!(cursor, error = %err, "metrics failed"),
            }
        }
    })?;

    std::thread::sleep(Duration::from_secs_f64(args.seconds));
    timer.stop();

    let engine = engine
        .lock()
        .map_err(|_| anyhow::anyhow!("engine lock poisoned"))?;
    println!("stopped at frame {}", engine.playback_state().cursor);
    Ok(())
}

/// Hands back frames that were predicted elsewhere.
struct Preloaded(nowcast::Sequence);

impl nowcast::Predictor for Preloaded {
    fn predict(
        &self,
        _inputs: &[nowcast::Frame],
        _horizon: u32,
        _variable: &str,
    ) -> nowcast::NowcastResult<nowcast::Sequence> {
        Ok(self.0.clone())
    }
}
