use std::fmt;
use std::panic::Location;
use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;
use super::zero_suppress_info::{LeafAddr, Level, ZzpKind};

/// The source location of an insertion, if the caller provided one
#[derive(Debug, Clone, Copy)]
pub struct Site(pub Option<&'static Location<'static>>);

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(loc) => write!(f, "{}:{}", loc.file(), loc.line()),
            None => write!(f, "<generic>"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ZeroSuppressError {
    #[error("Index {index} out of range for {kind} with capacity {capacity} (at {site})")]
    IndexOutOfRange {
        kind: ZzpKind,
        index: usize,
        capacity: usize,
        site: Site,
    },
    #[error("Slot {index} of {kind} already holds the maximum of {max} entries (at {site})")]
    TooManyEntries {
        kind: ZzpKind,
        index: usize,
        max: usize,
        site: Site,
    },
    #[error("{kind} is full with {capacity} items, cannot insert index {index} (at {site})")]
    ListFull {
        kind: ZzpKind,
        index: usize,
        capacity: usize,
        site: Site,
    },
    #[error("Entry {entry} cannot be added to a {kind} slot holding {count} entries")]
    NonSequentialEntry {
        kind: ZzpKind,
        entry: usize,
        count: usize,
    },
}

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("Zero-suppression info registered twice for leaf {0}")]
    Duplicate(LeafAddr),
    #[error("No zero-suppression info registered for leaf {0}")]
    Missing(LeafAddr),
    #[error("Nested zero suppression at route {route:?}: {inner} inside {outer}")]
    NestedZeroSuppress {
        route: Vec<usize>,
        outer: ZzpKind,
        inner: ZzpKind,
    },
}

#[derive(Debug, Clone, Error)]
pub enum MultiChunkError {
    #[error("Item {item} maps to event {event}, but the buffer only holds {events} events")]
    EventOutOfRange { item: usize, event: i64, events: usize },
    #[error("Event {event} claimed by item {item} was already claimed by item {previous}")]
    EventClaimed {
        event: usize,
        item: usize,
        previous: usize,
    },
    #[error("Item {item} has event counter {found:#x}, expected {expected:#x}")]
    CounterMismatch { item: usize, expected: u32, found: u32 },
    #[error("Module emitted {items} items for only {events} events")]
    TooManyItems { items: usize, events: usize },
    #[error("Item {item} does not exist, the module emitted {items} items")]
    NoSuchItem { item: usize, items: usize },
    #[error("Item {item} has counter offset {offset} with no matching trigger in the toggle map")]
    ToggleUnmapped { item: usize, offset: u32 },
}

#[derive(Debug, Clone, Error)]
pub enum UnpackError {
    #[error("Zero-suppressed container failed: {0}")]
    ZeroSuppress(#[from] ZeroSuppressError),
    #[error("Multi-event chunking failed: {0}")]
    MultiChunk(#[from] MultiChunkError),
    #[error("Route {0:?} does not lead to a leaf")]
    BadRoute(Vec<usize>),
    #[error("Unexpected word {word:#010x} at position {pos}: {what}")]
    BadWord {
        word: u32,
        pos: usize,
        what: &'static str,
    },
    #[error("Buffer ended after {0} words while more data was expected")]
    Truncated(usize),
    #[error("Record holds {triggers} triggers, limit is {limit}")]
    TooManyTriggers { triggers: u32, limit: u32 },
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Unknown {level} signal: {name}")]
    UnknownSignal { level: Level, name: String },
    #[error("Rule for {level} signal {prefix} matched no signals")]
    EmptyRule { level: Level, prefix: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session setup failed due to registry error: {0}")]
    RegistryError(#[from] RegistryError),
    #[error("Session setup failed due to signal error: {0}")]
    SignalError(#[from] SignalError),
    #[error("Session failed due to unpack error in event {event}: {source}")]
    UnpackError { event: u64, source: UnpackError },
}

#[derive(Debug, Error)]
pub enum EventFileError {
    #[error("Could not open event file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Event file reached end-of-file")]
    EndOfFile,
    #[error("Event file record {record} claims {words} words, limit is {limit}")]
    OversizedRecord {
        record: u64,
        words: u32,
        limit: u32,
    },
    #[error("Event file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config requests {0} worker threads; at least one is required")]
    BadThreadCount(i32),
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("Summary failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Summary failed to convert to yaml: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Summary failed to format a timestamp: {0}")]
    TimeError(#[from] time::error::Format),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to EventFile error: {0}")]
    EventFileError(#[from] EventFileError),
    #[error("Processor failed due to Session error: {0}")]
    SessionError(#[from] SessionError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Summary error: {0}")]
    SummaryError(#[from] SummaryError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
