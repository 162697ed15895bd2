use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::calibration::{CalibParam, CalibRule};
use super::detectors::MultiEventMode;
use super::error::ConfigError;
use super::event_file::WordOrder;
use super::mapping::MapRule;
use super::session::SessionOptions;

/// Structure representing the application configuration. Contains pathing, run information
/// and the mapping/calibration rules of the sessions.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub event_path: PathBuf,
    pub summary_path: PathBuf,
    pub byte_order: WordOrder,
    pub multi_event_mode: MultiEventMode,
    pub first_run_number: i32,
    pub last_run_number: i32,
    pub max_records: Option<u64>,
    pub dump_events: u64,
    pub watch: bool,
    pub correlate: Vec<String>,
    pub mapping: Vec<MapRule>,
    pub calibration: Vec<CalibRule>,
    pub n_threads: i32,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be invalid; rules are those of the
    /// demonstration layout
    fn default() -> Self {
        let strip_rule = |module: usize| CalibRule {
            src: format!("SST[{module}].data"),
            dest: format!("SST[{module}].E"),
            param: CalibParam::SlopeOffset {
                slope: 2.5,
                offset: -40.0,
            },
        };
        Self {
            event_path: PathBuf::from("None"),
            summary_path: PathBuf::from("None"),
            byte_order: WordOrder::Big,
            multi_event_mode: MultiEventMode::Offset,
            first_run_number: 0,
            last_run_number: 0,
            max_records: None,
            dump_events: 0,
            watch: true,
            correlate: vec![],
            mapping: vec![],
            calibration: vec![
                strip_rule(0),
                strip_rule(1),
                CalibRule {
                    src: String::from("TDC.hits"),
                    dest: String::from("TDC.T"),
                    param: CalibParam::OffsetSlope {
                        offset: -1000.0,
                        slope: 0.1,
                    },
                },
            ],
            n_threads: 1,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;
        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        if !config.is_n_threads_valid() {
            return Err(ConfigError::BadThreadCount(config.n_threads));
        }
        Ok(config)
    }

    /// Write the configuration as YAML
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Check if a specific run exists by evaluating the existance of its event file
    pub fn does_run_exist(&self, run_number: i32) -> bool {
        self.event_path
            .join(format!("{}.evt", self.get_run_str(run_number)))
            .exists()
    }

    /// Get the Path to a run file
    pub fn get_run_file(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        let run_file = self
            .event_path
            .join(format!("{}.evt", self.get_run_str(run_number)));
        if run_file.exists() {
            Ok(run_file)
        } else {
            Err(ConfigError::BadFilePath(run_file))
        }
    }

    /// Get the path to the output run summary
    pub fn get_summary_file_name(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        if self.summary_path.exists() {
            Ok(self
                .summary_path
                .join(format!("{}.yml", self.get_run_str(run_number))))
        } else {
            Err(ConfigError::BadFilePath(self.summary_path.clone()))
        }
    }

    /// Construct the run string, zero padded to four digits
    pub fn get_run_str(&self, run_number: i32) -> String {
        format!("run_{run_number:0>4}")
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    /// The per-event behaviour handed to each session
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            mapping: self.mapping.clone(),
            calibration: self.calibration.clone(),
            watch: self.watch,
            correlate: self.correlate.clone(),
            dump_events: self.dump_events,
        }
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_back() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("type: slope_offset"));
        assert!(yaml.contains("byte_order: big"));
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_hand_written_config() {
        let yaml = r#"
event_path: /data/evt
summary_path: /data/summary
byte_order: little
multi_event_mode: continuous
first_run_number: 3
last_run_number: 9
max_records: 1000
dump_events: 2
watch: false
correlate: ["SST[0].E"]
mapping:
  - src: SST[1].data
    dest: SST[0].data
calibration:
  - src: SST[0].data
    dest: SST[0].E
    param:
      type: cut_below_or_equal
      cut: 20.0
n_threads: 4
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.byte_order, WordOrder::Little);
        assert_eq!(config.multi_event_mode, MultiEventMode::Continuous);
        assert_eq!(config.max_records, Some(1000));
        assert_eq!(config.get_run_str(7), "run_0007");
        let options = config.session_options();
        assert_eq!(options.mapping[0].dest, "SST[0].data");
        assert_eq!(
            options.calibration[0].param,
            CalibParam::CutBelowOrEqual { cut: 20.0 }
        );
    }

    #[test]
    fn test_missing_file() {
        let path = Path::new("/nonexistent/ucesb/config.yml");
        assert!(matches!(
            Config::read_config_file(path),
            Err(ConfigError::BadFilePath(_))
        ));
    }
}
