use clap::{value_parser, Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};

use libucesb::config::Config;
use libucesb::detectors::synthesize;
use libucesb::error::EventFileError;
use libucesb::event_file::EventFileWriter;
use libucesb::process::{create_subsets, process_subset};
use libucesb::worker_status::WorkerStatus;

/// Route the library's spdlog output to a log file next to the invocation
fn init_file_logger() -> Result<(), spdlog::Error> {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(PathBuf::from("./ucesb_cli.log"))
            .truncate(true)
            .build()?,
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .flush_level_filter(spdlog::LevelFilter::All)
            .sink(file_sink)
            .build()?,
    );
    spdlog::set_default_logger(logger);
    Ok(())
}

/// Write synthetic event files for every run of the configured range
fn make_synthetic_runs(config: &Config, records: usize, triggers: u32) -> Result<(), EventFileError> {
    std::fs::create_dir_all(&config.event_path)?;
    for run in config.first_run_number..(config.last_run_number + 1) {
        let path = config
            .event_path
            .join(format!("{}.evt", config.get_run_str(run)));
        let mut writer = EventFileWriter::create(&path, config.byte_order)?;
        let per_run = (records as u32).wrapping_mul(triggers.max(1));
        let first_event = (run.max(0) as u32).wrapping_mul(per_run);
        for record in synthesize(first_event, records, triggers) {
            writer.write_record(&record)?;
        }
        writer.finish()?;
        log::info!("Wrote {} records to {}", records, path.display());
    }
    Ok(())
}

fn bar_style(color: &str) -> ProgressStyle {
    ProgressStyle::with_template(&format!(
        "[{{prefix}}] {{bar:40.{color}/blue}} {{pos:>3}}% {{msg}}"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn main() {
    // Create a cli
    let matches = Command::new("ucesb_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("synth")
                .about("Write synthetic event files for the configured run range")
                .arg(
                    Arg::new("records")
                        .short('n')
                        .long("records")
                        .value_parser(value_parser!(usize))
                        .default_value("1000")
                        .help("Records per run"),
                )
                .arg(
                    Arg::new("triggers")
                        .short('t')
                        .long("triggers")
                        .value_parser(value_parser!(u32))
                        .default_value("2")
                        .help("Triggers per record"),
                ),
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }
    if let Err(e) = init_file_logger() {
        log::warn!("Could not create the log file, library messages are lost: {e}");
    }

    // Parse the cli
    let config_path = match matches.get_one::<String>("path") {
        Some(p) => PathBuf::from(p),
        None => {
            log::error!("A configuration path is required");
            return;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        match Config::default().write_config_file(&config_path) {
            Ok(()) => log::info!("Done."),
            Err(e) => log::error!("Could not write the template config: {e}"),
        }
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");

    if let Some(("synth", sub)) = matches.subcommand() {
        let records = sub.get_one::<usize>("records").copied().unwrap_or(1000);
        let triggers = sub.get_one::<u32>("triggers").copied().unwrap_or(2);
        if let Err(e) = make_synthetic_runs(&config, records, triggers) {
            log::error!("Could not write synthetic runs: {e}");
        }
        return;
    }

    log::info!("Event Path: {}", config.event_path.to_string_lossy());
    log::info!("Summary Path: {}", config.summary_path.to_string_lossy());
    log::info!(
        "First Run: {} Last Run: {}",
        config.first_run_number,
        config.last_run_number
    );
    log::info!(
        "Mapping rules: {} Calibration rules: {}",
        config.mapping.len(),
        config.calibration.len()
    );
    log::info!("Workers: {}", config.n_threads);

    run_workers(&config, &pb_manager, &config_path);
}

/// Spawn one worker per non-empty subset and drive their progress bars until all finish
fn run_workers(config: &Config, pb_manager: &MultiProgress, config_path: &Path) {
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let mut workers = vec![];
    let mut bars: HashMap<usize, ProgressBar> = HashMap::new();
    for (idx, subset) in create_subsets(config).into_iter().enumerate() {
        // Dont make empty workers
        if subset.is_empty() {
            continue;
        }
        let pb = pb_manager.add(ProgressBar::new(100));
        pb.set_style(bar_style("cyan"));
        pb.set_prefix(format!("worker {idx}"));
        bars.insert(idx, pb);

        let conf = config.clone();
        let worker_tx = tx.clone();
        workers.push(std::thread::spawn(move || {
            process_subset(conf, worker_tx, idx, subset)
        }));
    }
    drop(tx);

    // The channel disconnects once every worker has dropped its sender
    for status in rx.iter() {
        if let Some(pb) = bars.get(&status.worker_id) {
            pb.set_style(bar_style(status.color.name()));
            pb.set_position((status.progress * 100.0).min(100.0) as u64);
            pb.set_message(format!(
                "run {} | {} events",
                status.run_number, status.events
            ));
        }
    }

    let mut failed = false;
    for worker in workers {
        match worker.join() {
            Ok(Ok(())) => (),
            Ok(Err(e)) => {
                failed = true;
                log::error!("Processing failed with error: {e}");
            }
            Err(_) => {
                failed = true;
                log::error!("Failed to join a worker!");
            }
        }
    }
    for pb in bars.values() {
        pb.finish();
    }

    if failed {
        log::error!(
            "Some runs of {} failed, check ucesb_cli.log for details",
            config_path.display()
        );
    } else {
        log::info!("Successfully processed all runs!");
    }
    log::info!("Done.");
}
