//! # libucesb
//!
//! libucesb is the storage and mapping engine of an unpacker for nuclear physics event
//! data, written in Rust. Detector readout is unpacked into fixed-shape, zero-suppressed
//! containers, then mapped and calibrated through three levels of the same event layout:
//!
//! - **unpack**: what the readout modules delivered, in module order
//! - **raw**: the same values arranged by detector signal name
//! - **cal**: calibrated values (floating point), ready for analysis
//!
//! Every zero-suppressed container registers itself with a per-level registry, so that
//! inserting a value into any leaf marks it (and its enclosing item) as valid. Clearing an
//! event only touches what was written. Mapping and calibration tables are resolved once
//! per session by signal name, e.g. `SST[1].E[17]`, and applied per event by walking only
//! the valid leaves of the source level.
//!
//! ## Containers
//!
//! | Container | Storage | Clean |
//! |-----------|---------|-------|
//! | `RawArray` | dense, items always present | every item |
//! | `RawArrayZeroSuppress` | dense + validity bitset | set bits only |
//! | `RawArrayMultiZeroSuppress` | dense items of capacity `M` + per item fill counts | set bits only |
//! | `RawListZeroSuppress` | sorted (index, value) list, capped at `N` | list length |
//! | `RawListIiZeroSuppress` | insertion-order list, capped at `N` | list length |
//!
//! Zero-suppressed containers may not nest inside each other; registering such a layout
//! fails when the session is created.
//!
//! ## Configuration
//!
//! Runs are described by a YAML configuration. A template is written by
//! `ucesb_cli -p config.yml new`:
//!
//! ```yml
//! event_path: None
//! summary_path: None
//! byte_order: big
//! multi_event_mode: offset
//! first_run_number: 0
//! last_run_number: 0
//! max_records: null
//! dump_events: 0
//! watch: true
//! correlate: []
//! mapping: []
//! calibration:
//! - src: SST[0].data
//!   dest: SST[0].E
//!   param:
//!     type: slope_offset
//!     slope: 2.5
//!     offset: -40.0
//! - src: SST[1].data
//!   dest: SST[1].E
//!   param:
//!     type: slope_offset
//!     slope: 2.5
//!     offset: -40.0
//! - src: TDC.hits
//!   dest: TDC.T
//!   param:
//!     type: offset_slope
//!     offset: -1000.0
//!     slope: 0.1
//! n_threads: 1
//! ```
//!
//! - `mapping` rules redirect a raw-level signal prefix to another one (`src` names an
//! unpack-level signal, `dest` a raw-level one). Signals without a rule map to the
//! raw-level signal of the same name, when it exists.
//! - `calibration` rules apply one of `offset`, `slope`, `slope_offset`, `offset_slope`
//! or `cut_below_or_equal` between a raw-level and a cal-level signal.
//! - `correlate` lists cal-level signal prefixes whose coincidences are counted.
//! - `multi_event_mode` selects how the TDC chunks of a multi-trigger record are assigned
//! to events: by their counter relative to the record's event number (`offset`), or
//! relative to the first chunk (`continuous`).
//!
//! ## Event files
//!
//! Event files are named `run_XXXX.evt` and hold a sequence of records, each with a
//! 12 byte header (event number, trigger count, word count as 32 bit words in the
//! configured byte order) followed by the payload words.
//!
//! ## Output
//!
//! Each processed run writes `run_XXXX.yml` to the summary path: record and event counts,
//! the zero-suppressed raw-level containers with their capacities, watcher statistics for
//! every cal-level signal that fired, and the most frequent correlation pairs. Detailed
//! progress goes to the log file.
pub mod bitsone;
pub mod calibration;
pub mod config;
pub mod correlation;
pub mod detectors;
pub mod error;
pub mod event_file;
pub mod leaf;
pub mod list_ii_zero_suppress;
pub mod list_zero_suppress;
pub mod mapping;
pub mod members;
pub mod multi_chunks;
pub mod multi_zero_suppress;
pub mod process;
pub mod raw_array;
pub mod session;
pub mod signal_id;
pub mod signal_map;
pub mod summary;
pub mod watch;
pub mod worker_status;
pub mod zero_suppress;
pub mod zero_suppress_info;
