use serde::{Deserialize, Serialize};

use super::error::{RegistryError, SessionError, SignalError, UnpackError};
use super::leaf::{Leaf, Value};
use super::members::{LeafVisitor, Members};
use super::signal_map::SignalNames;
use super::zero_suppress_info::{
    AppendedEntries, LeafAddr, ZeroSuppressDescriptor, ZeroSuppressRegistry,
};

/// Per channel conversion from a raw value to a calibrated one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalibParam {
    Offset { offset: f64 },
    Slope { slope: f64 },
    /// `value * slope + offset`
    SlopeOffset { slope: f64, offset: f64 },
    /// `(value + offset) * slope`
    OffsetSlope { offset: f64, slope: f64 },
    /// Drop values at or below the cut; keep others unchanged
    CutBelowOrEqual { cut: f64 },
}

impl CalibParam {
    /// The calibrated value, or None if the value is discarded
    pub fn apply(&self, value: f64) -> Option<f64> {
        match *self {
            CalibParam::Offset { offset } => Some(value + offset),
            CalibParam::Slope { slope } => Some(value * slope),
            CalibParam::SlopeOffset { slope, offset } => Some(value * slope + offset),
            CalibParam::OffsetSlope { offset, slope } => Some((value + offset) * slope),
            CalibParam::CutBelowOrEqual { cut } => (value > cut).then_some(value),
        }
    }
}

/// Calibrate every raw leaf below `src` into the cal leaf with the same suffix below `dest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibRule {
    pub src: String,
    pub dest: String,
    pub param: CalibParam,
}

#[derive(Debug, Clone)]
struct CalibEntry {
    param: Option<CalibParam>,
    target: ZeroSuppressDescriptor,
}

/// Resolved calibration of the raw leaves, indexed by raw flat index.
///
/// Leaves with the same name at both levels are copied unchanged unless a rule
/// covers them.
#[derive(Debug, Default)]
pub struct CalibTable {
    entries: Vec<Option<CalibEntry>>,
}

impl CalibTable {
    pub fn build(
        src: &SignalNames,
        dest: &SignalNames,
        registry: &ZeroSuppressRegistry,
        rules: &[CalibRule],
    ) -> Result<Self, SessionError> {
        let mut entries: Vec<Option<CalibEntry>> = vec![None; src.len()];
        let resolve = |flat: usize| -> Result<ZeroSuppressDescriptor, RegistryError> {
            let addr = LeafAddr::new(dest.level(), flat);
            registry
                .get(addr, false)?
                .cloned()
                .ok_or(RegistryError::Missing(addr))
        };

        for (flat, meta) in src.iter() {
            if let Ok(dest_flat) = dest.flat(&meta.name) {
                entries[flat] = Some(CalibEntry {
                    param: None,
                    target: resolve(dest_flat)?,
                });
            }
        }

        for rule in rules {
            let mut matched = 0;
            for (flat, suffix) in src.matching(&rule.src) {
                let dest_flat = dest.flat(&format!("{}{}", rule.dest, suffix))?;
                entries[flat] = Some(CalibEntry {
                    param: Some(rule.param),
                    target: resolve(dest_flat)?,
                });
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

        let calibrated = entries
            .iter()
            .flatten()
            .filter(|entry| entry.param.is_some())
            .count();
        spdlog::debug!(
            "Calibration {} -> {}: {} leaves with parameters, {} copied",
            src.level(),
            dest.level(),
            calibrated,
            entries.iter().flatten().count() - calibrated
        );
        Ok(Self { entries })
    }

    pub fn param(&self, flat: usize) -> Option<&CalibParam> {
        self.entries
            .get(flat)
            .and_then(Option::as_ref)
            .and_then(|entry| entry.param.as_ref())
    }

    pub fn target(&self, flat: usize) -> Option<&ZeroSuppressDescriptor> {
        self.entries
            .get(flat)
            .and_then(Option::as_ref)
            .map(|entry| &entry.target)
    }
}

/// Calibrates each visited leaf into the destination mirror, for one event.
///
/// Cut values are dropped; in multi-entry and append only containers the later entries
/// of the slot move up to fill the gap.
pub struct CalibSink<'a> {
    table: &'a CalibTable,
    dest: &'a mut dyn Members,
    appended: AppendedEntries,
}

impl<'a> CalibSink<'a> {
    pub fn new(table: &'a CalibTable, dest: &'a mut dyn Members) -> Self {
        Self {
            table,
            dest,
            appended: AppendedEntries::new(),
        }
    }
}

impl LeafVisitor for CalibSink<'_> {
    fn visit(&mut self, flat: usize, leaf: &dyn Leaf) -> Result<(), UnpackError> {
        let Some(Some(entry)) = self.table.entries.get(flat) else {
            return Ok(());
        };
        let value = match &entry.param {
            None => leaf.value(),
            Some(param) => match param.apply(leaf.value().as_f64()) {
                Some(v) => Value::Float(v),
                None => return Ok(()),
            },
        };
        let route = self.appended.route(&entry.target);
        self.dest.locate_mut(route)?.set_value(value);
        Ok(())
    }
}
