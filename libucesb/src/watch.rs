use serde::Serialize;

use super::error::UnpackError;
use super::leaf::Leaf;
use super::members::LeafVisitor;
use super::signal_map::SignalNames;

#[derive(Debug, Clone, Copy, Default)]
struct LeafStats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

/// Summary of one watched signal, as written to the run summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchSummary {
    pub name: String,
    pub count: u64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Running statistics of every leaf that was valid in some event
#[derive(Debug, Clone)]
pub struct Watcher {
    stats: Vec<LeafStats>,
    events: u64,
}

impl Watcher {
    pub fn new(leaf_count: usize) -> Self {
        Self {
            stats: vec![LeafStats::default(); leaf_count],
            events: 0,
        }
    }

    pub fn begin_event(&mut self) {
        self.events += 1;
    }

    pub fn events(&self) -> u64 {
        self.events
    }

    /// Number of times the leaf was valid
    pub fn count(&self, flat: usize) -> u64 {
        self.stats.get(flat).map_or(0, |s| s.count)
    }

    /// Signals seen at least once, in flat order
    pub fn report(&self, names: &SignalNames) -> Vec<WatchSummary> {
        self.stats
            .iter()
            .enumerate()
            .filter(|(_, s)| s.count > 0)
            .map(|(flat, s)| WatchSummary {
                name: names
                    .name(flat)
                    .map_or_else(|| format!("#{flat}"), str::to_string),
                count: s.count,
                mean: s.sum / s.count as f64,
                min: s.min,
                max: s.max,
            })
            .collect()
    }
}

impl LeafVisitor for Watcher {
    fn visit(&mut self, flat: usize, leaf: &dyn Leaf) -> Result<(), UnpackError> {
        let Some(stats) = self.stats.get_mut(flat) else {
            return Ok(());
        };
        let value = leaf.value().as_f64();
        if stats.count == 0 {
            stats.min = value;
            stats.max = value;
        } else {
            stats.min = stats.min.min(value);
            stats.max = stats.max.max(value);
        }
        stats.count += 1;
        stats.sum += value;
        Ok(())
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::Members;
    use crate::zero_suppress::RawArrayZeroSuppress;
    use crate::zero_suppress_info::Level;

    #[derive(Debug, Clone, Default)]
    struct Cal {
        e: RawArrayZeroSuppress<f32, 3>,
    }

    crate::impl_members!(Cal { e: "E" });

    #[test]
    fn test_statistics() {
        let mut cal = Cal::default();
        let names = SignalNames::build(Level::Cal, &cal);
        let mut watcher = Watcher::new(cal.leaf_count());
        for value in [2.0, 6.0, 4.0] {
            cal.clean();
            *cal.e.insert_index(1).unwrap() = value;
            watcher.begin_event();
            cal.watch_members(&mut watcher).unwrap();
        }
        assert_eq!(watcher.events(), 3);
        assert_eq!(watcher.count(0), 0);
        assert_eq!(
            watcher.report(&names),
            vec![WatchSummary {
                name: "E[1]".to_string(),
                count: 3,
                mean: 4.0,
                min: 2.0,
                max: 6.0,
            }]
        );
    }
}
