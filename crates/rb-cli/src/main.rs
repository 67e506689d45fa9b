//! `render-bench`: runs the scripted benchmark scenario against one or
//! more rendering backends and prints the collected metrics.

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use rb_core::{FsFetcher, load_scene};
use rb_harness::{BenchConfig, Metrics, MonotonicClock, Session, default_probe, panel};
use rb_render::BackendKind;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "render-bench", version)]
struct Cli {
    /// Scene location below the data root (`.json`, anything else is XML).
    scene: String,

    /// JSON config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backends to run, in order (canvas, scene, svg).
    #[arg(long = "backend", value_delimiter = ',')]
    backends: Vec<BackendKind>,

    /// Directory that scene, activity and resource locations resolve against.
    #[arg(long)]
    data_root: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Mutation palette seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Seed the mutation palette from the OS instead.
    #[arg(long, conflicts_with = "seed")]
    random: bool,

    /// Idle render-loop ticks after each build.
    #[arg(long)]
    frames: Option<u32>,

    #[arg(long)]
    drag_frames: Option<u32>,

    #[arg(long)]
    mutations: Option<u32>,

    #[arg(long)]
    activities: Option<u32>,

    /// Print one JSON array instead of panel text.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn config(&self) -> anyhow::Result<BenchConfig> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::load(path)?,
            None => BenchConfig::default(),
        };
        if !self.backends.is_empty() {
            config.backends = self.backends.clone();
        }
        if let Some(root) = &self.data_root {
            config.data_root = root.clone();
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if self.random {
            config.seed = None;
        } else if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(frames) = self.frames {
            config.idle_frames = frames;
        }
        if let Some(frames) = self.drag_frames {
            config.drag_frames = frames;
        }
        if let Some(n) = self.mutations {
            config.mutations = n;
        }
        if let Some(n) = self.activities {
            config.activity_advances = n;
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    backend: BackendKind,
    drawables: usize,
    metrics: Metrics,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.config()?;
    anyhow::ensure!(
        config.data_root.is_dir(),
        "data root '{}' is not a directory",
        config.data_root.display()
    );

    let fetcher = Arc::new(FsFetcher::new(config.data_root.clone()));
    let scene = load_scene(fetcher.as_ref(), &cli.scene).await;
    let backends = config.backends.clone();

    let mut session = Session::new(config, fetcher, Rc::new(MonotonicClock::new()), default_probe());
    let mut reports = Vec::with_capacity(backends.len());
    for kind in backends {
        reports.push(run_scenario(&mut session, kind, &scene).await);
    }
    session.stop();

    if cli.json {
        let text = serde_json::to_string_pretty(&reports).context("serialize metrics")?;
        println!("{text}");
    } else {
        for report in &reports {
            println!("== {} ({} drawables)", report.backend, report.drawables);
            println!("{}\n", panel::render(&report.metrics));
        }
    }
    Ok(())
}

async fn run_scenario(session: &mut Session, kind: BackendKind, scene: &rb_core::Scene) -> Report {
    let config = session.config().clone();
    if session.start(kind, scene).await {
        session.settle().await;
        session.run_frames(config.idle_frames).await;

        match session.find_draggable() {
            Some(from) => {
                session.drag(from, config.drag_frames).await;
            }
            None => log::info!("{kind}: no draggable shape, skipping drag"),
        }

        for _ in 0..config.mutations {
            session.mutate();
            session.run_frames(1).await;
        }

        for _ in 0..config.activity_advances {
            if let Some(Err(e)) = session.advance_activity().await {
                log::warn!("{kind}: activity stopped: {e}");
                break;
            }
            session.toggle_arrow_color();
            session.run_frames(1).await;
        }

        if session.play().is_some_and(|n| n > 0) {
            session.run_frames(config.idle_frames.min(30)).await;
            session.pause();
        }
    }

    let report = Report {
        backend: kind,
        drawables: session.handle().drawable_count(),
        metrics: session.snapshot(),
    };
    session.stop();
    report
}
