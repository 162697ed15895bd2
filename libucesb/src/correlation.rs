use bit_set::BitSet;
use fxhash::FxHashMap;
use serde::Serialize;

use super::error::{SignalError, UnpackError};
use super::leaf::Leaf;
use super::members::LeafVisitor;
use super::signal_map::SignalNames;

/// Flat indices of the leaves that were non-zero in the current event
#[derive(Debug, Clone, Default)]
pub struct CorrelationList {
    hits: BitSet,
}

impl CorrelationList {
    pub fn new(leaf_count: usize) -> Self {
        Self {
            hits: BitSet::with_capacity(leaf_count),
        }
    }

    pub fn clear(&mut self) {
        self.hits.clear();
    }

    pub fn contains(&self, flat: usize) -> bool {
        self.hits.contains(flat)
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.hits.iter()
    }
}

impl LeafVisitor for CorrelationList {
    fn visit(&mut self, flat: usize, leaf: &dyn Leaf) -> Result<(), UnpackError> {
        if !leaf.value().is_zero() {
            self.hits.insert(flat);
        }
        Ok(())
    }
}

/// Number of events in which two signals fired together
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationCount {
    pub first: String,
    pub second: String,
    pub count: u64,
}

/// Pairwise coincidence counts over a selection of signals
#[derive(Debug, Clone, Default)]
pub struct CorrelationMatrix {
    selected: BitSet,
    pairs: FxHashMap<(usize, usize), u64>,
    scratch: Vec<usize>,
}

impl CorrelationMatrix {
    /// Select the signals below any of the given name prefixes
    pub fn new(names: &SignalNames, prefixes: &[String]) -> Result<Self, SignalError> {
        let mut selected = BitSet::with_capacity(names.len());
        for prefix in prefixes {
            let before = selected.len();
            for (flat, _) in names.matching(prefix) {
                selected.insert(flat);
            }
            if selected.len() == before {
                return Err(SignalError::EmptyRule {
                    level: names.level(),
                    prefix: prefix.clone(),
                });
            }
        }
        Ok(Self {
            selected,
            ..Default::default()
        })
    }

    pub fn selected(&self) -> usize {
        self.selected.len()
    }

    /// Count every pair of selected signals present in the list, including each
    /// signal with itself
    pub fn accumulate(&mut self, list: &CorrelationList) {
        self.scratch.clear();
        self.scratch
            .extend(list.iter().filter(|flat| self.selected.contains(*flat)));
        for (pos, &a) in self.scratch.iter().enumerate() {
            for &b in &self.scratch[pos..] {
                *self.pairs.entry((a, b)).or_insert(0) += 1;
            }
        }
    }

    pub fn count(&self, a: usize, b: usize) -> u64 {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.pairs.get(&key).copied().unwrap_or(0)
    }

    /// The `limit` most frequent pairs, most frequent first
    pub fn report(&self, names: &SignalNames, limit: usize) -> Vec<CorrelationCount> {
        let mut pairs: Vec<(&(usize, usize), &u64)> = self.pairs.iter().collect();
        pairs.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        let name = |flat: usize| {
            names
                .name(flat)
                .map_or_else(|| format!("#{flat}"), str::to_string)
        };
        pairs
            .into_iter()
            .take(limit)
            .map(|(&(a, b), &count)| CorrelationCount {
                first: name(a),
                second: name(b),
                count,
            })
            .collect()
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
        a: RawArrayZeroSuppress<u16, 4>,
        b: RawArrayZeroSuppress<u16, 4>,
    }

    crate::impl_members!(Cal { a: "A", b: "B" });

    #[test]
    fn test_list_skips_zero_values() {
        let mut cal = Cal::default();
        *cal.a.insert_index(1).unwrap() = 3;
        cal.a.insert_index(2).unwrap();
        *cal.b.insert_index(0).unwrap() = 1;
        let mut list = CorrelationList::new(cal.leaf_count());
        cal.add_corr_members(&mut list).unwrap();
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![1, 4]);
    }

    #[test]
    fn test_matrix_counts_pairs() {
        let mut cal = Cal::default();
        let names = SignalNames::build(Level::Cal, &cal);
        let mut matrix = CorrelationMatrix::new(&names, &["A".to_string()]).unwrap();
        assert_eq!(matrix.selected(), 4);
        let mut list = CorrelationList::new(cal.leaf_count());
        for hits in [[0usize, 3], [3, 1], [0, 3]] {
            cal.clean();
            list.clear();
            for ch in hits {
                *cal.a.insert_index(ch).unwrap() = 7;
            }
            *cal.b.insert_index(0).unwrap() = 7;
            cal.add_corr_members(&mut list).unwrap();
            matrix.accumulate(&list);
        }
        assert_eq!(matrix.count(3, 0), 2);
        assert_eq!(matrix.count(3, 3), 3);
        assert_eq!(matrix.count(0, 4), 0);
        let top = matrix.report(&names, 1);
        assert_eq!(top[0].first, "A[3]");
        assert_eq!(top[0].count, 3);
    }

    #[test]
    fn test_unknown_prefix() {
        let names = SignalNames::build(Level::Cal, &Cal::default());
        assert!(CorrelationMatrix::new(&names, &["C".to_string()]).is_err());
    }
}
