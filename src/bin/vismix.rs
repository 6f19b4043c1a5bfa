use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use vismix::{ControlCommand, SessionSpec, Studio};

#[derive(Parser, Debug)]
#[command(name = "vismix", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a session offline for N ticks and write program output as PNGs.
    Render(RenderArgs),
    /// Validate a session file and print a summary.
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input session JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output directory for frame_NNNNN.png files.
    #[arg(long)]
    out: PathBuf,

    /// Number of ticks to run.
    #[arg(long)]
    ticks: u64,

    /// Start the armed transition on this tick (1-based).
    #[arg(long)]
    transition_at: Option<u64>,

    /// Transition duration in ticks; defaults to the session's configured
    /// duration.
    #[arg(long)]
    duration: Option<u64>,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Input session JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Probe(args) => cmd_probe(args),
    }
}

fn read_session(path: &Path) -> anyhow::Result<SessionSpec> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("open session '{}'", path.display()))?;
    let spec = SessionSpec::from_json(&json).with_context(|| "parse session JSON")?;
    Ok(spec)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let spec = read_session(&args.in_path)?;
    let mut studio: Studio = spec.build().with_context(|| "build session")?;

    fs::create_dir_all(&args.out)
        .with_context(|| format!("create output dir '{}'", args.out.display()))?;

    let duration = args
        .duration
        .unwrap_or_else(|| studio.default_transition_ticks());
    let config = *studio.config();

    for tick in 1..=args.ticks {
        if args.transition_at == Some(tick) {
            studio
                .apply(ControlCommand::StartTransition {
                    duration_ticks: duration,
                })
                .with_context(|| "start transition")?;
        }
        studio.tick();

        for event in studio.take_events() {
            eprintln!("event: {:?}: {}", event.kind, event.context);
        }

        let frame = studio.output().program;
        let path = args.out.join(format!("frame_{tick:05}.png"));
        image::save_buffer(
            &path,
            frame.data(),
            config.width,
            config.height,
            image::ColorType::Rgb8,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
    }

    eprintln!("wrote {} frames to {}", args.ticks, args.out.display());
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let spec = read_session(&args.in_path)?;
    let studio = spec.build().with_context(|| "build session")?;
    let config = studio.config();

    eprintln!(
        "{}x{} @ {} Hz, transition {} ms ({} ticks), feather {} px",
        config.width,
        config.height,
        config.rate.hz(),
        config.transition_ms,
        config.default_transition_ticks(),
        config.wipe_feather,
    );
    for input in &spec.inputs {
        eprintln!("input '{}': {:?}", input.name, input.kind);
    }
    if let Some(name) = &spec.program {
        eprintln!("program: {name}");
    }
    if let Some(name) = &spec.preview {
        eprintln!("preview: {name}");
    }
    if let Some(kind) = spec.transition {
        eprintln!("armed transition: {kind:?}");
    }
    eprintln!("session OK");
    Ok(())
}
