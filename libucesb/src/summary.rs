use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::correlation::CorrelationCount;
use super::error::SummaryError;
use super::session::{EventLayout, Session};
use super::watch::WatchSummary;
use super::zero_suppress_info::Level;

/// Number of correlation pairs listed in a summary
const TOP_CORRELATIONS: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct LimitSummary {
    pub name: String,
    pub kind: String,
    pub capacity: usize,
    pub multiplicity: usize,
}

/// Side file describing one processed run, written as YAML next to the other outputs
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_number: i32,
    pub event_file: PathBuf,
    pub file_size: String,
    pub started: String,
    pub finished: String,
    pub records: u64,
    pub events: u64,
    pub bytes_read: String,
    pub zero_suppressed_raw: Vec<LimitSummary>,
    pub watch: Vec<WatchSummary>,
    pub correlations: Vec<CorrelationCount>,
}

impl RunSummary {
    pub fn start(run_number: i32, event_file: &Path, file_size: u64) -> Result<Self, SummaryError> {
        Ok(Self {
            run_number,
            event_file: event_file.to_path_buf(),
            file_size: human_bytes::human_bytes(file_size as f64),
            started: OffsetDateTime::now_utc().format(&Rfc3339)?,
            finished: String::new(),
            records: 0,
            events: 0,
            bytes_read: String::new(),
            zero_suppressed_raw: vec![],
            watch: vec![],
            correlations: vec![],
        })
    }

    /// Collect the final state of the session
    pub fn finish<E: EventLayout>(
        &mut self,
        session: &Session<E>,
        bytes_read: u64,
    ) -> Result<(), SummaryError> {
        let stats = session.stats();
        self.finished = OffsetDateTime::now_utc().format(&Rfc3339)?;
        self.records = stats.records;
        self.events = stats.events;
        self.bytes_read = human_bytes::human_bytes(bytes_read as f64);
        self.zero_suppressed_raw = session
            .names(Level::Raw)
            .limits()
            .iter()
            .map(|limit| LimitSummary {
                name: limit.name.clone(),
                kind: limit.kind.to_string(),
                capacity: limit.capacity,
                multiplicity: limit.multiplicity,
            })
            .collect();
        if let Some(watcher) = session.watcher() {
            self.watch = watcher.report(session.names(Level::Cal));
        }
        if let Some(matrix) = session.correlation() {
            self.correlations = matrix.report(session.names(Level::Cal), TOP_CORRELATIONS);
        }
        Ok(())
    }

    pub fn write(&self, path: &Path) -> Result<(), SummaryError> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(serde_yaml::to_string(self)?.as_bytes())?;
        Ok(())
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::{synthesize, DemoLayout};
    use crate::config::Config;

    #[test]
    fn test_summary_yaml() {
        let options = Config::default().session_options();
        let mut session = Session::new(DemoLayout::default(), &options).unwrap();
        let mut bytes = 0;
        for record in synthesize(0, 5, 2) {
            bytes += record.size_bytes();
            session.process_record(&record).unwrap();
        }
        let mut summary = RunSummary::start(3, Path::new("run_0003.evt"), bytes).unwrap();
        summary.finish(&session, bytes).unwrap();
        assert_eq!(summary.records, 5);
        assert_eq!(summary.events, 10);
        assert!(!summary.watch.is_empty());

        let yaml = serde_yaml::to_string(&summary).unwrap();
        assert!(yaml.contains("run_number: 3"));
        assert!(yaml.contains("raw_list_zero_suppress"));
        assert!(yaml.contains("SST[0].data"));
    }
}
