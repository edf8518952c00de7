use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use humansize::{format_size, DECIMAL};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use simplelog::LevelFilter;
use std::path::{Path, PathBuf};
use std::thread;

use crate::cancel::CancelToken;
use crate::finder::{DuplicateFinder, FindResult};
use crate::progress::{ChannelProgress, Phase, ProgressUpdate};
use crate::report::DuplicateReport;
use crate::Cli;

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Set up the logger based on verbosity level and log file
pub fn setup_logger(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
    let level = level_for(verbosity);

    if let Some(log_path) = log_file {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Could not create log file {:?}", log_path))?;
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level);
        builder.format_timestamp_millis();
        builder.format_target(false);
        builder.target(env_logger::Target::Pipe(Box::new(file)));
        if let Err(e) = builder.try_init() {
            eprintln!("Warning: Could not initialize logger: {}", e);
        }
        return Ok(());
    }

    // Logs go to stderr so --json output on stdout stays parseable
    if let Err(e) = simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    ) {
        eprintln!("Warning: Could not initialize logger: {}", e);
    }
    Ok(())
}

/// Run the application using the provided options
pub fn run_app(cli: &Cli) -> Result<()> {
    let log_path: Option<PathBuf> = match (&cli.log_file, cli.log) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => Some(PathBuf::from("imgdups.log")),
        (None, false) => None,
    };
    setup_logger(cli.verbose, log_path.as_deref())?;

    log::info!("Logger initialized. Application starting.");
    log::debug!("CLI args: {:#?}", cli);

    if !cli.directory.exists() {
        log::error!("Target directory {:?} does not exist.", cli.directory);
        anyhow::bail!("Target directory does not exist: {:?}", cli.directory);
    }
    if !cli.directory.is_dir() {
        log::error!("Target path {:?} is not a directory.", cli.directory);
        anyhow::bail!("Target path is not a directory: {:?}", cli.directory);
    }

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received interrupt, cancelling scan");
        handler_token.cancel();
    }) {
        log::warn!("Could not install Ctrl-C handler: {}", e);
    }

    let options = cli.finder_options();
    let threshold = options.threshold;
    let result = run_scan(
        DuplicateFinder::new(options),
        cli.directory.clone(),
        cli.progress,
        cancel.clone(),
    )
    .context("Duplicate search failed")?;

    if was_cancelled(&cancel, &result) {
        println!("Scan cancelled.");
        return Ok(());
    }

    let report = DuplicateReport::new(&cli.directory, threshold, &result);

    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }

    if let Some(output_path) = &cli.output {
        report.write(output_path, cli.output_format())?;
        if !cli.json {
            println!("Duplicate report saved to {:?}", output_path);
        }
    }

    Ok(())
}

/// A cancelled search returns an empty result. A token set after the search
/// already finished does not discard its result.
fn was_cancelled(cancel: &CancelToken, result: &FindResult) -> bool {
    cancel.is_cancelled() && result.is_empty()
}

/// Run the search on a worker thread and drive the progress bar from this
/// one until the worker finishes.
fn run_scan(
    finder: DuplicateFinder,
    root: PathBuf,
    show_progress: bool,
    cancel: CancelToken,
) -> Result<FindResult> {
    let (progress_tx, progress_rx) = unbounded::<ProgressUpdate>();

    let scan_thread = thread::spawn(move || {
        let sink = ChannelProgress::new(progress_tx);
        finder.find(&root, &sink, &cancel)
    });

    // Ends once the scan thread drops its sink
    drive_progress(&progress_rx, show_progress);

    match scan_thread.join() {
        Ok(result) => Ok(result?),
        Err(_) => {
            log::error!("[ScanThread] Scan thread panicked.");
            anyhow::bail!("Scan thread panicked")
        }
    }
}

fn drive_progress(rx: &Receiver<ProgressUpdate>, show_progress: bool) {
    let draw_target = if show_progress {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    };
    let pb = ProgressBar::with_draw_target(Some(100), draw_target);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
    {
        pb.set_style(style.progress_chars("#=> "));
    }

    for update in rx.iter() {
        let message = match Phase::from_label(&update.label) {
            Some(phase) => format!("{} ({}/2)", update.label, phase.number()),
            None => update.label,
        };
        pb.set_message(message);
        pb.set_position(u64::from(update.percent));
    }
    pb.finish_and_clear();
}

fn print_report(report: &DuplicateReport) {
    if report.groups.is_empty() {
        println!("No similar images found.");
    } else {
        println!("Found {} groups of similar images:", report.groups.len());
        for (i, group) in report.groups.iter().enumerate() {
            println!(
                "  Group {} ({} files, {} reclaimable):",
                i + 1,
                group.remove.len() + 1,
                format_size(group.reclaimable_bytes, DECIMAL)
            );
            println!("    keep   {}", group.keep.display());
            for path in &group.remove {
                println!("    remove {}", path.display());
            }
        }
        println!(
            "Total reclaimable: {}",
            format_size(report.reclaimable_bytes(), DECIMAL)
        );
    }

    if !report.failed.is_empty() {
        println!("Could not read {} files:", report.failed.len());
        for failed in &report.failed {
            println!("  {}: {}", failed.path.display(), failed.error);
        }
    }
}
