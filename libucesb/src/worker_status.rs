/// Color of a worker's progress bar, by what the worker is doing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BarColor {
    #[default]
    CYAN,
    RED,
    GREEN,
}

impl BarColor {
    /// Name of the color in progress bar style templates
    pub fn name(&self) -> &'static str {
        match self {
            BarColor::CYAN => "cyan",
            BarColor::RED => "red",
            BarColor::GREEN => "green",
        }
    }
}

/// Progress message sent from a worker to the progress display
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub run_number: i32,
    pub worker_id: usize,
    pub color: BarColor,
    /// Events processed so far in this run
    pub events: u64,
}

impl WorkerStatus {
    pub fn new(progress: f32, run_number: i32, worker_id: usize, color: BarColor, events: u64) -> Self {
        Self {
            progress,
            run_number,
            worker_id,
            color,
            events,
        }
    }
}
