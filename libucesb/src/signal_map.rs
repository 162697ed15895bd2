use fxhash::FxHashMap;

use super::error::SignalError;
use super::leaf::LeafKind;
use super::members::{EnumerateMode, EnumerateVisitor, LeafInfo, LimitInfo, Members};
use super::signal_id::SignalId;
use super::zero_suppress_info::{Level, ZzpKind};

/// Name and type of one leaf of a mirror
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMeta {
    pub name: String,
    pub kind: LeafKind,
    pub unit: Option<&'static str>,
}

/// A zero-suppressed container found while naming a mirror
#[derive(Debug, Clone, PartialEq)]
pub struct LimitMeta {
    pub name: String,
    pub flat: usize,
    pub kind: ZzpKind,
    pub capacity: usize,
    pub multiplicity: usize,
}

/// Name table of one mirror, in both directions.
///
/// Built once from `enumerate_members`; mapping and calibration rules are resolved
/// against it at session setup.
#[derive(Debug, Clone)]
pub struct SignalNames {
    level: Level,
    leaves: Vec<SignalMeta>,
    lookup: FxHashMap<String, usize>,
    limits: Vec<LimitMeta>,
}

struct NameCollector<'a> {
    leaves: &'a mut Vec<Option<SignalMeta>>,
    limits: &'a mut Vec<LimitMeta>,
}

impl EnumerateVisitor for NameCollector<'_> {
    fn leaf(&mut self, leaf: &LeafInfo<'_>) {
        if let Some(slot) = self.leaves.get_mut(leaf.flat) {
            *slot = Some(SignalMeta {
                name: leaf.id.to_string(),
                kind: leaf.kind,
                unit: leaf.unit,
            });
        }
    }

    fn limit(&mut self, limit: &LimitInfo<'_>) {
        self.limits.push(LimitMeta {
            name: limit.id.to_string(),
            flat: limit.flat,
            kind: limit.kind,
            capacity: limit.capacity,
            multiplicity: limit.multiplicity,
        });
    }
}

impl SignalNames {
    pub fn build(level: Level, root: &dyn Members) -> Self {
        let mut slots: Vec<Option<SignalMeta>> = vec![None; root.leaf_count()];
        let mut limits = Vec::new();
        root.enumerate_members(
            &SignalId::new(),
            0,
            EnumerateMode::All,
            None,
            &mut NameCollector {
                leaves: &mut slots,
                limits: &mut limits,
            },
        );

        let leaves: Vec<SignalMeta> = slots
            .into_iter()
            .enumerate()
            .map(|(flat, meta)| {
                meta.unwrap_or_else(|| SignalMeta {
                    name: format!("#{flat}"),
                    kind: LeafKind::U32,
                    unit: None,
                })
            })
            .collect();
        let lookup = leaves
            .iter()
            .enumerate()
            .map(|(flat, meta)| (meta.name.clone(), flat))
            .collect();

        Self {
            level,
            leaves,
            lookup,
            limits,
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn flat(&self, name: &str) -> Result<usize, SignalError> {
        self.lookup
            .get(name)
            .copied()
            .ok_or_else(|| SignalError::UnknownSignal {
                level: self.level,
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    pub fn name(&self, flat: usize) -> Option<&str> {
        self.leaves.get(flat).map(|meta| meta.name.as_str())
    }

    pub fn meta(&self, flat: usize) -> Option<&SignalMeta> {
        self.leaves.get(flat)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &SignalMeta)> + '_ {
        self.leaves.iter().enumerate()
    }

    pub fn limits(&self) -> &[LimitMeta] {
        &self.limits
    }

    /// Leaves at or below `prefix`, in flat order, with the remainder of their name.
    ///
    /// `SST[1].data` matches `SST[1].data[4]` but not `SST[1].database`.
    pub fn matching<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (usize, &'a str)> + 'a {
        self.leaves
            .iter()
            .enumerate()
            .filter_map(move |(flat, meta)| {
                let rest = meta.name.strip_prefix(prefix)?;
                if rest.is_empty() || rest.starts_with('.') || rest.starts_with('[') {
                    Some((flat, rest))
                } else {
                    None
                }
            })
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw_array::RawArray;
    use crate::zero_suppress::RawArrayZeroSuppress;

    #[derive(Debug, Clone, Default)]
    struct Module {
        header: u32,
        data: RawArrayZeroSuppress<u16, 4>,
    }

    crate::impl_members!(Module {
        header: "header",
        data: "data" @ "ch",
    });

    #[derive(Debug, Clone, Default)]
    struct Layout {
        sst: RawArray<Module, 2>,
        trigger: u8,
    }

    crate::impl_members!(Layout {
        sst: "SST",
        trigger: "TRIGGER",
    });

    #[test]
    fn test_names_follow_flat_order() {
        let names = SignalNames::build(Level::Unpack, &Layout::default());
        assert_eq!(names.len(), 11);
        assert_eq!(names.name(0), Some("SST[0].header"));
        assert_eq!(names.name(3), Some("SST[0].data[2]"));
        assert_eq!(names.name(5), Some("SST[1].header"));
        assert_eq!(names.name(10), Some("TRIGGER"));
        assert_eq!(names.flat("SST[1].data[3]").unwrap(), 9);
        assert_eq!(names.meta(4).and_then(|m| m.unit), Some("ch"));
        assert!(matches!(
            names.flat("SST[2].header"),
            Err(SignalError::UnknownSignal { .. })
        ));
    }

    #[test]
    fn test_prefix_matching() {
        let names = SignalNames::build(Level::Raw, &Layout::default());
        let matched: Vec<(usize, &str)> = names.matching("SST[1].data").collect();
        assert_eq!(matched, vec![(6, "[0]"), (7, "[1]"), (8, "[2]"), (9, "[3]")]);
        assert_eq!(names.matching("SST[1].dat").count(), 0);
        assert_eq!(names.matching("TRIGGER").collect::<Vec<_>>(), vec![(10, "")]);
    }

    #[test]
    fn test_limits_reported() {
        let names = SignalNames::build(Level::Raw, &Layout::default());
        let limits: Vec<(&str, usize)> = names
            .limits()
            .iter()
            .map(|l| (l.name.as_str(), l.flat))
            .collect();
        assert_eq!(limits, vec![("SST[0].data", 1), ("SST[1].data", 6)]);
    }
}
