//! CLI front end for the search pipeline.
//!
//! Runs the pipeline on a background task and renders its events: two
//! progress bars (requests / sub-objects), stage messages, and in
//! interactive mode a candidate prompt answered over the reply channel.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use earthcrawl::progress::{
    ExportKind, ExportState, PipelineEvent, ProgressReporter, ProgressState, Stage,
};
use earthcrawl::{AreaCandidate, Config, SearchPipeline};

#[derive(Parser, Debug)]
#[command(name = "earthcrawl")]
#[command(about = "Fetch region boundaries and populated places from OSM and export them")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "earthcrawl.toml")]
    config: PathBuf,

    /// Search line: "Name1[=level1]; Name2[=level2]; ..."
    /// Falls back to `search.line` from the config.
    #[arg(short, long)]
    search: Option<String>,

    /// Override the export directory from the config
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Prompt for a candidate when name resolution is ambiguous
    #[arg(short, long)]
    interactive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = if args.config.exists() {
        Config::load_from_file(&args.config)?
    } else {
        Config::default()
    };
    if let Some(dir) = args.export_dir {
        config.export.directory = dir;
    }

    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if !args.config.exists() {
        warn!(
            config = %args.config.display(),
            "config file not found, using defaults"
        );
    }

    let search_line = args
        .search
        .or_else(|| config.search.line.clone())
        .context("no search line given (use --search or search.line in the config)")?;
    info!(search = %search_line, "earthcrawl starting");

    let (reporter, mut events) = ProgressReporter::channel();
    let pipeline = SearchPipeline::new(config)
        .reporter(reporter)
        .interactive(args.interactive);
    let worker = tokio::spawn(async move { pipeline.run(&search_line).await });

    let bars = MultiProgress::new();
    let bar_style = ProgressStyle::default_bar()
        .template("{prefix:>10} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .context("bad progress template")?
        .progress_chars("#>-");
    let mut object_bar: Option<ProgressBar> = None;
    let mut sub_bar: Option<ProgressBar> = None;
    let mut state = ProgressState::default();

    while let Some(event) = events.recv().await {
        state.apply(&event);
        match event {
            PipelineEvent::Object { index, count } => {
                let bar = object_bar.get_or_insert_with(|| {
                    let b = bars.add(ProgressBar::new(count as u64));
                    b.set_style(bar_style.clone());
                    b.set_prefix("requests");
                    b
                });
                bar.set_length(count as u64);
                bar.set_position(index as u64);
            }
            PipelineEvent::SubObject { index, count } => {
                let bar = sub_bar.get_or_insert_with(|| {
                    let b = bars.add(ProgressBar::new(count as u64));
                    b.set_style(bar_style.clone());
                    b.set_prefix("objects");
                    b
                });
                bar.set_length(count as u64);
                bar.set_position(index as u64);
                if let Some(stage) = state.stage {
                    bar.set_message(stage_label(stage));
                }
            }
            PipelineEvent::Stage(stage) => {
                if let Some(bar) = &sub_bar {
                    bar.set_message(stage_label(stage));
                }
            }
            PipelineEvent::RequestFailed { .. } => {
                if let Some(bar) = &object_bar {
                    bar.set_message(format!("{} failed", state.failed_requests));
                }
            }
            PipelineEvent::CandidatesReady { candidates, reply } => {
                let index = prompt_for_candidate(&candidates).await?;
                // The pipeline treats a dropped sender as cancellation.
                let _ = reply.send(index);
            }
            PipelineEvent::Export { kind, state } => {
                let kind = match kind {
                    ExportKind::Kml => "KML",
                    ExportKind::Spreadsheet => "spreadsheet",
                };
                match state {
                    ExportState::Started => info!("exporting {kind}..."),
                    ExportState::Done => info!("{kind} export done"),
                }
            }
            PipelineEvent::Finished => break,
        }
    }

    if let Some(bar) = object_bar {
        bar.finish_and_clear();
    }
    if let Some(bar) = sub_bar {
        bar.finish_and_clear();
    }

    worker
        .await
        .context("pipeline task panicked")?
        .context("pipeline failed")?;
    info!("done");
    Ok(())
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::RegionSearch => "regions search",
        Stage::LocationSearch => "locations search",
        Stage::Export => "export",
        Stage::Finished => "finished",
    }
}

/// Print the candidate list and read a selection from stdin. Runs on the
/// blocking pool so the event loop stays clear.
async fn prompt_for_candidate(candidates: &[AreaCandidate]) -> Result<usize> {
    let lines: Vec<String> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("  [{i}] {} ({}/{})", c.display_name, c.osm_type, c.osm_id))
        .collect();

    tokio::task::spawn_blocking(move || {
        println!("Several candidates found:");
        for line in &lines {
            println!("{line}");
        }
        print!("Choose one [0]: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        Ok(input.trim().parse().unwrap_or(0))
    })
    .await
    .context("selection prompt failed")?
}
