//! Unpack to raw mapping.
//!
//! Every unpack leaf whose name also exists at the raw level is mapped to it. Rules
//! from the configuration redirect whole subtrees (`src` prefix to `dest` prefix).
//! Destinations are resolved once, to the registered zero-suppression descriptor of
//! the raw leaf, so the per-event copy only follows a route.
use serde::{Deserialize, Serialize};

use super::error::{SessionError, SignalError, UnpackError};
use super::leaf::Leaf;
use super::members::{LeafVisitor, Members};
use super::signal_map::SignalNames;
use super::zero_suppress_info::{
    AppendedEntries, LeafAddr, Level, ZeroSuppressDescriptor, ZeroSuppressRegistry,
};

/// Map every unpack leaf below `src` to the raw leaf with the same name suffix below `dest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRule {
    pub src: String,
    pub dest: String,
}

/// Resolved destinations of the unpack leaves, indexed by unpack flat index
#[derive(Debug, Default)]
pub struct MappingTable {
    targets: Vec<Option<ZeroSuppressDescriptor>>,
}

impl MappingTable {
    pub fn build(
        src: &SignalNames,
        dest: &SignalNames,
        registry: &ZeroSuppressRegistry,
        rules: &[MapRule],
    ) -> Result<Self, SessionError> {
        let mut targets: Vec<Option<ZeroSuppressDescriptor>> = vec![None; src.len()];

        for (flat, meta) in src.iter() {
            if let Ok(dest_flat) = dest.flat(&meta.name) {
                targets[flat] = Self::resolve(registry, dest.level(), dest_flat)?;
            }
        }

        for rule in rules {
            let mut matched = 0;
            for (flat, suffix) in src.matching(&rule.src) {
                let dest_name = format!("{}{}", rule.dest, suffix);
                let dest_flat = dest.flat(&dest_name)?;
                targets[flat] = Self::resolve(registry, dest.level(), dest_flat)?;
                matched += 1;
            }
            if matched == 0 {
                return Err(SignalError::EmptyRule {
                    level: src.level(),
                    prefix: rule.src.clone(),
                }
                .into());
            }
        }

        let table = Self { targets };
        spdlog::debug!(
            "Mapping {} -> {}: {} of {} leaves mapped, {} into zero-suppressed containers",
            src.level(),
            dest.level(),
            table.mapped(),
            table.targets.len(),
            table.zero_suppressed()
        );
        if table.mapped() == 0 {
            spdlog::warn!(
                "No {} leaf has a {} destination, the {} level will stay empty",
                src.level(),
                dest.level(),
                dest.level()
            );
        }
        Ok(table)
    }

    fn resolve(
        registry: &ZeroSuppressRegistry,
        level: Level,
        flat: usize,
    ) -> Result<Option<ZeroSuppressDescriptor>, SessionError> {
        Ok(registry.get(LeafAddr::new(level, flat), false)?.cloned())
    }

    pub fn target(&self, flat: usize) -> Option<&ZeroSuppressDescriptor> {
        self.targets.get(flat).and_then(Option::as_ref)
    }

    /// Number of source leaves with a destination
    pub fn mapped(&self) -> usize {
        self.targets.iter().flatten().count()
    }

    fn zero_suppressed(&self) -> usize {
        self.targets
            .iter()
            .flatten()
            .filter(|desc| desc.info.is_zero_suppressed())
            .count()
    }
}

/// Copies each visited leaf into the destination mirror, for one event
pub struct MapSink<'a> {
    table: &'a MappingTable,
    dest: &'a mut dyn Members,
    appended: AppendedEntries,
}

impl<'a> MapSink<'a> {
    pub fn new(table: &'a MappingTable, dest: &'a mut dyn Members) -> Self {
        Self {
            table,
            dest,
            appended: AppendedEntries::new(),
        }
    }
}

impl LeafVisitor for MapSink<'_> {
    fn visit(&mut self, flat: usize, leaf: &dyn Leaf) -> Result<(), UnpackError> {
        if let Some(target) = self.table.target(flat) {
            let route = self.appended.route(target);
            self.dest.locate_mut(route)?.set_value(leaf.value());
        }
        Ok(())
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::list_zero_suppress::RawListZeroSuppress;
    use crate::multi_zero_suppress::RawArrayMultiZeroSuppress;
    use crate::zero_suppress::RawArrayZeroSuppress;
    use crate::zero_suppress_info::ZzpWalk;

    #[derive(Debug, Clone, Default)]
    struct Unpacked {
        adc: RawArrayZeroSuppress<u16, 8>,
        tag: u32,
    }

    crate::impl_members!(Unpacked {
        adc: "ADC",
        tag: "TAG",
    });

    #[derive(Debug, Clone, Default)]
    struct Raw {
        adc: RawListZeroSuppress<u16, 8>,
        other: RawArrayZeroSuppress<u32, 8>,
    }

    crate::impl_members!(Raw {
        adc: "ADC",
        other: "OTHER",
    });

    fn setup(rules: &[MapRule]) -> Result<MappingTable, SessionError> {
        let mut registry = ZeroSuppressRegistry::new();
        Raw::default().zero_suppress_info_ptrs(&mut ZzpWalk::new(Level::Raw, &mut registry))?;
        let src = SignalNames::build(Level::Unpack, &Unpacked::default());
        let dest = SignalNames::build(Level::Raw, &Raw::default());
        MappingTable::build(&src, &dest, &registry, rules)
    }

    #[test]
    fn test_identity_by_name() {
        let table = setup(&[]).unwrap();
        assert_eq!(table.mapped(), 8);
        assert!(table.target(8).is_none());

        let mut unpack = Unpacked::default();
        *unpack.adc.insert_index(6).unwrap() = 60;
        *unpack.adc.insert_index(2).unwrap() = 20;
        let mut raw = Raw::default();
        unpack.map_members(&mut MapSink::new(&table, &mut raw)).unwrap();
        let got: Vec<(usize, u16)> = raw.adc.iter().map(|(i, v)| (i, *v)).collect();
        assert_eq!(got, vec![(2, 20), (6, 60)]);
        assert!(raw.other.is_empty());
    }

    #[test]
    fn test_rule_redirects_subtree() {
        let rules = vec![MapRule {
            src: "ADC".to_string(),
            dest: "OTHER".to_string(),
        }];
        let table = setup(&rules).unwrap();
        let mut unpack = Unpacked::default();
        *unpack.adc.insert_index(5).unwrap() = 3;
        let mut raw = Raw::default();
        unpack.map_members(&mut MapSink::new(&table, &mut raw)).unwrap();
        assert!(raw.adc.is_empty());
        assert_eq!(raw.other.get(5), Some(&3));
    }

    #[test]
    fn test_bad_rules() {
        let empty = vec![MapRule {
            src: "NOPE".to_string(),
            dest: "ADC".to_string(),
        }];
        assert!(matches!(
            setup(&empty),
            Err(SessionError::SignalError(SignalError::EmptyRule { .. }))
        ));
        let unknown = vec![MapRule {
            src: "TAG".to_string(),
            dest: "OTHER".to_string(),
        }];
        assert!(matches!(
            setup(&unknown),
            Err(SessionError::SignalError(SignalError::UnknownSignal { .. }))
        ));
    }

    #[derive(Debug, Clone, Default)]
    struct Hits {
        hits: RawArrayMultiZeroSuppress<u16, 2, 3>,
    }

    crate::impl_members!(Hits { hits: "HITS" });

    #[derive(Debug, Clone, Default)]
    struct SortedHits {
        hits: RawArrayMultiZeroSuppress<u16, 2, 3>,
        first: RawArrayZeroSuppress<u16, 2>,
    }

    crate::impl_members!(SortedHits {
        hits: "HITS",
        first: "FIRST",
    });

    #[test]
    fn test_partial_rule_keeps_entries_packed() {
        let mut registry = ZeroSuppressRegistry::new();
        SortedHits::default()
            .zero_suppress_info_ptrs(&mut ZzpWalk::new(Level::Raw, &mut registry))
            .unwrap();
        let src = SignalNames::build(Level::Unpack, &Hits::default());
        let dest = SignalNames::build(Level::Raw, &SortedHits::default());
        let rules = vec![MapRule {
            src: "HITS[1][0]".to_string(),
            dest: "FIRST[1]".to_string(),
        }];
        let table = MappingTable::build(&src, &dest, &registry, &rules).unwrap();

        let mut unpack = Hits::default();
        for value in [5, 6, 7] {
            *unpack.hits.insert_index(1).unwrap() = value;
        }
        let mut raw = SortedHits::default();
        unpack.map_members(&mut MapSink::new(&table, &mut raw)).unwrap();
        assert_eq!(raw.first.get(1), Some(&5));
        assert_eq!(raw.hits.entries(1), &[6, 7]);
    }
}
