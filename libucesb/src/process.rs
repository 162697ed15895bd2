use std::sync::mpsc::Sender;

use super::config::Config;
use super::detectors::DemoLayout;
use super::error::{EventFileError, ProcessorError};
use super::event_file::{EventFileReader, EventRecord};
use super::session::Session;
use super::summary::RunSummary;
use super::worker_status::{BarColor, WorkerStatus};

/// The main loop of ucesb.
///
/// This takes in a config (and progress monitor) and unpacks, maps and calibrates every
/// record of one run, then writes the run summary.
pub fn process_run(
    config: &Config,
    run_number: i32,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(), ProcessorError> {
    let run_path = config.get_run_file(run_number)?;
    let summary_path = config.get_summary_file_name(run_number)?;
    let total_data_size = std::fs::metadata(&run_path)?.len();
    spdlog::info!(
        "Total run size: {}",
        human_bytes::human_bytes(total_data_size as f64)
    );

    let mut reader = EventFileReader::open(&run_path, config.byte_order)?;
    let mut session = Session::new(
        DemoLayout::new(config.multi_event_mode),
        &config.session_options(),
    )?;
    let mut summary = RunSummary::start(run_number, &run_path, total_data_size)?;

    let flush_frac: f32 = 0.01;
    let mut count = 0;
    let mut progress: f32 = 0.0;
    let flush_val = (total_data_size as f64 * flush_frac as f64) as u64;

    tx.send(WorkerStatus::new(
        0.0,
        run_number,
        *worker_id,
        BarColor::CYAN,
        0,
    ))?;
    let mut record = EventRecord::default();
    loop {
        match reader.read_record_into(&mut record) {
            Ok(()) => (),
            Err(EventFileError::EndOfFile) => break,
            Err(e) => {
                tx.send(WorkerStatus::new(
                    progress,
                    run_number,
                    *worker_id,
                    BarColor::RED,
                    session.stats().events,
                ))?;
                return Err(e.into());
            }
        }

        if let Err(e) = session.process_record(&record) {
            tx.send(WorkerStatus::new(
                progress,
                run_number,
                *worker_id,
                BarColor::RED,
                session.stats().events,
            ))?;
            return Err(e.into());
        }

        count += record.size_bytes();
        if count > flush_val {
            count = 0;
            progress += flush_frac;
            tx.send(WorkerStatus::new(
                progress,
                run_number,
                *worker_id,
                BarColor::CYAN,
                session.stats().events,
            ))?;
        }

        if let Some(max_records) = config.max_records {
            if reader.records_read() >= max_records {
                spdlog::info!("Reached the limit of {max_records} records, stopping run {run_number}");
                break;
            }
        }
    }

    let stats = session.stats();
    spdlog::info!(
        "Run {} processed {} records holding {} events",
        run_number,
        stats.records,
        stats.events
    );
    summary.finish(&session, reader.bytes_read())?;
    summary.write(&summary_path)?;
    spdlog::info!("Wrote run summary to {}", summary_path.display());

    tx.send(WorkerStatus::new(
        1.0,
        run_number,
        *worker_id,
        BarColor::GREEN,
        stats.events,
    ))?;
    Ok(())
}

/// Process a subset of runs
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<i32>,
) -> Result<(), ProcessorError> {
    for run in subset {
        if config.does_run_exist(run) {
            spdlog::info!("Processing run {}...", run);
            process_run(&config, run, &tx, &worker_id)?;
            spdlog::info!("Finished processing run {}.", run);
        } else {
            spdlog::info!("Run {} does not exist, skipping...", run);
        }
    }
    Ok(())
}

/// Divide a run range in to a set of subranges (per thread/worker)
pub fn create_subsets(config: &Config) -> Vec<Vec<i32>> {
    let mut subsets: Vec<Vec<i32>> = vec![Vec::new(); config.n_threads.max(1) as usize];
    let n_subsets = subsets.len();

    for (idx, run) in (config.first_run_number..(config.last_run_number + 1)).enumerate() {
        subsets[idx % n_subsets].push(run)
    }

    subsets
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::synthesize;
    use crate::event_file::EventFileWriter;
    use std::sync::mpsc;

    #[test]
    fn test_create_subsets() {
        let config = Config {
            first_run_number: 2,
            last_run_number: 8,
            n_threads: 3,
            ..Default::default()
        };
        assert_eq!(
            create_subsets(&config),
            vec![vec![2, 5, 8], vec![3, 6], vec![4, 7]]
        );
    }

    #[test]
    fn test_process_run_writes_summary() {
        let dir = std::env::temp_dir().join(format!("ucesb_process_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let config = Config {
            event_path: dir.clone(),
            summary_path: dir.clone(),
            first_run_number: 1,
            last_run_number: 2,
            max_records: Some(6),
            ..Default::default()
        };
        let mut writer =
            EventFileWriter::create(&dir.join("run_0001.evt"), config.byte_order).unwrap();
        for record in synthesize(100, 10, 3) {
            writer.write_record(&record).unwrap();
        }
        writer.finish().unwrap();

        let (tx, rx) = mpsc::channel();
        process_subset(config, tx, 0, vec![1, 2]).unwrap();
        let statuses: Vec<WorkerStatus> = rx.try_iter().collect();
        let last = statuses.last().unwrap();
        assert_eq!(last.color, BarColor::GREEN);
        assert_eq!(last.events, 18);

        let summary = std::fs::read_to_string(dir.join("run_0001.yml")).unwrap();
        assert!(summary.contains("records: 6"));
        assert!(!dir.join("run_0002.yml").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
