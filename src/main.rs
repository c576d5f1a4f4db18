use anyhow::{Context, Result};
use clap::Parser;
use scribeq::cli::{Cli, Commands};
use scribeq::config::Config;
use scribeq::export::{ExportFormat, export_to_file, export_transcript};
use scribeq::job::{JobController, JobControllerConfig, ModelSize};
use scribeq::runner::{ItemOutcome, QueueRunner, RunnerEvent};
use scribeq::storage::{JsonFileStore, TranscriptStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let config = load_config(cli.config.as_deref())?.with_env_overrides();

    match cli.command {
        Commands::Transcribe {
            files,
            model,
            device,
            worker,
            grace,
            format,
            output_dir,
            save,
        } => {
            let format: ExportFormat = format.parse()?;
            let model = match model {
                Some(model) => model.parse::<ModelSize>()?,
                None => config.worker.model,
            };

            let mut controller_config = config.controller_config();
            if let Some(worker) = worker {
                controller_config.worker_program = worker;
            }
            if let Some(device) = device {
                controller_config.device = Some(device);
            }
            if let Some(grace) = grace {
                controller_config.grace_period = grace;
            }

            run_transcribe(
                &config,
                controller_config,
                model,
                files,
                format,
                output_dir,
                save,
                cli.quiet,
            )
            .await?;
        }
        Commands::History => {
            let store = open_store(&config)?;
            for summary in store.list().await? {
                println!(
                    "{}  {}  {:>8.1}s  {}  {}",
                    summary.id,
                    summary.created_at.format("%Y-%m-%d %H:%M"),
                    summary.duration,
                    summary.language,
                    summary.file_name,
                );
            }
        }
        Commands::Export { id, format, output } => {
            let format: ExportFormat = format.parse()?;
            let store = open_store(&config)?;
            let stored = store.load(&id).await?;
            let transcript = stored.transcript();
            match output {
                Some(path) => {
                    export_to_file(&transcript, format, &path)?;
                    eprintln!("Exported to {}", path.display());
                }
                None => println!("{}", export_transcript(&transcript, format)?),
            }
        }
        Commands::Delete { id } => {
            let store = open_store(&config)?;
            store.delete(&id).await?;
            eprintln!("Deleted {id}");
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_transcribe(
    config: &Config,
    controller_config: JobControllerConfig,
    model: ModelSize,
    files: Vec<PathBuf>,
    format: ExportFormat,
    output_dir: Option<PathBuf>,
    save: bool,
    quiet: bool,
) -> Result<()> {
    let controller = JobController::new(controller_config);

    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let mut runner = QueueRunner::new(controller, model).with_event_sender(event_tx);
    if save {
        runner = runner.with_store(Arc::new(open_store_impl(config)?));
    }

    // Progress reporting off the orchestration path.
    let reporter = std::thread::spawn(move || {
        for event in event_rx {
            if quiet {
                continue;
            }
            match event {
                RunnerEvent::ItemStarted { item_id, .. } => {
                    eprintln!("[{item_id}] started");
                }
                RunnerEvent::ItemProgress {
                    item_id,
                    percent,
                    status,
                } => {
                    eprintln!("[{item_id}] {percent:>3}% {status}");
                }
                RunnerEvent::ItemCompleted { item_id, .. } => {
                    eprintln!("[{item_id}] done");
                }
                RunnerEvent::ItemFailed { item_id, message } => {
                    eprintln!("[{item_id}] failed: {message}");
                }
            }
        }
    });

    let paths: Vec<String> = files
        .iter()
        .map(|path| path.to_string_lossy().to_string())
        .collect();
    runner.queue_mut().enqueue(&paths);

    let outcomes = runner.drain().await;
    // Items are kept after processing; map outcomes back to their inputs.
    let input_of = |item_id: &str| {
        runner
            .queue()
            .get(item_id)
            .map(|item| item.file_path.clone())
            .unwrap_or_default()
    };

    let mut failures = 0usize;
    for outcome in &outcomes {
        match outcome {
            ItemOutcome::Completed {
                item_id,
                transcript,
            } => {
                let input = input_of(item_id);
                let out = export_path(Path::new(&input), output_dir.as_deref(), format);
                export_to_file(transcript, format, &out)
                    .with_context(|| format!("writing {}", out.display()))?;
                println!("{}", out.display());
            }
            ItemOutcome::Failed { message, .. } => {
                failures += 1;
                eprintln!("scribeq: {message}");
            }
            ItemOutcome::Cancelled { .. } => failures += 1,
        }
    }

    drop(runner); // closes the event channel
    reporter.join().ok();

    if failures > 0 {
        anyhow::bail!("{failures} file(s) failed to transcribe");
    }
    Ok(())
}

/// Output path: `<dir>/<input stem>.<ext>`, next to the input by default.
fn export_path(input: &Path, output_dir: Option<&Path>, format: ExportFormat) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default();
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    dir.join(stem).with_extension(format.extension())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display())),
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path),
            None => Ok(Config::default()),
        },
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn TranscriptStore>> {
    Ok(Arc::new(open_store_impl(config)?))
}

fn open_store_impl(config: &Config) -> Result<JsonFileStore> {
    let dir = match config.storage.dir.clone() {
        Some(dir) => dir,
        None => JsonFileStore::default_dir()?,
    };
    Ok(JsonFileStore::new(dir))
}

fn init_logging(quiet: bool, verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scribeq={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
