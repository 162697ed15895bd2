//! The generic member traversal protocol.
//!
//! Every leaf type, every container and every event structure implements [`Members`].
//! The same topology is mirrored at the unpack, raw and cal levels and the operations
//! below walk it recursively. Instead of one code generator expansion per operation,
//! the per-event operations (map, calibrate, watch, correlate) share a single walk,
//! [`Members::visit_valid`], and are specialized by the [`LeafVisitor`] handed to it.
//!
//! Leaves are numbered depth first over the *dense* index space, so every slot of every
//! container has a stable flat index whether or not it holds data in a given event.
//! Containers hand each slot the flat base `flat + slot * stride` with
//! `stride = item.leaf_count()`.
use std::fmt::{Display, Write};

use super::calibration::CalibSink;
use super::correlation::CorrelationList;
use super::error::{RegistryError, UnpackError};
use super::leaf::{Leaf, LeafKind, Value};
use super::mapping::MapSink;
use super::signal_id::SignalId;
use super::watch::Watcher;
use super::zero_suppress_info::{ZzpKind, ZzpWalk};

/// Controls how deep `enumerate_members` looks into containers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerateMode {
    /// Only slot 0 of every container, to discover the shape of the items
    Discovery,
    /// Every slot, plus the validity side channel of zero-suppressed containers
    All,
}

/// Description of one leaf handed to an [`EnumerateVisitor`]
#[derive(Debug, Clone, Copy)]
pub struct LeafInfo<'a> {
    pub id: &'a SignalId,
    pub flat: usize,
    pub kind: LeafKind,
    pub min: Value,
    pub max: Value,
    pub unit: Option<&'static str>,
}

/// Description of the validity mask or count of a zero-suppressed container
#[derive(Debug, Clone, Copy)]
pub struct LimitInfo<'a> {
    pub id: &'a SignalId,
    pub flat: usize,
    pub kind: ZzpKind,
    pub capacity: usize,
    /// Entries per slot (1 except for multi zero-suppressed arrays)
    pub multiplicity: usize,
}

pub trait EnumerateVisitor {
    fn leaf(&mut self, leaf: &LeafInfo<'_>);

    fn limit(&mut self, _limit: &LimitInfo<'_>) {}
}

impl<F> EnumerateVisitor for F
where
    F: FnMut(&LeafInfo<'_>),
{
    fn leaf(&mut self, leaf: &LeafInfo<'_>) {
        self(leaf)
    }
}

/// Receives every valid leaf of a structure together with its flat index
pub trait LeafVisitor {
    fn visit(&mut self, flat: usize, leaf: &dyn Leaf) -> Result<(), UnpackError>;
}

impl<F> LeafVisitor for F
where
    F: FnMut(usize, &dyn Leaf) -> Result<(), UnpackError>,
{
    fn visit(&mut self, flat: usize, leaf: &dyn Leaf) -> Result<(), UnpackError> {
        self(flat, leaf)
    }
}

/// Collects `name: value` lines for dumps and shape listings
#[derive(Debug, Default)]
pub struct PrettyPrinter {
    out: String,
}

impl PrettyPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, id: &SignalId, text: impl Display) {
        // Writing into a String cannot fail
        let _ = writeln!(self.out, "{id}: {text}");
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.out.lines()
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// The traversal protocol shared by leaves, containers and event structures.
pub trait Members {
    /// Number of leaves in the dense layout; the flat index stride of this member
    fn leaf_count(&self) -> usize;

    /// Reset to "nothing valid". Zero-suppressed containers do this in O(1)
    fn clean(&mut self);

    /// Print the valid leaves with their values
    fn dump(&self, id: &SignalId, pp: &mut PrettyPrinter);

    /// Print the static shape
    fn show_members(&self, id: &SignalId, unit: Option<&'static str>, pp: &mut PrettyPrinter);

    fn enumerate_members(
        &self,
        id: &SignalId,
        flat: usize,
        mode: EnumerateMode,
        unit: Option<&'static str>,
        visitor: &mut dyn EnumerateVisitor,
    );

    /// Register the zero-suppression descriptor of every leaf. Run once per session.
    fn zero_suppress_info_ptrs(&self, walk: &mut ZzpWalk<'_>) -> Result<(), RegistryError>;

    /// Visit every valid leaf, in ascending flat order
    fn visit_valid(&self, flat: usize, visitor: &mut dyn LeafVisitor) -> Result<(), UnpackError>;

    /// Find the leaf at `route`, inserting into zero-suppressed containers on the way
    fn locate_mut(&mut self, route: &[usize]) -> Result<&mut dyn Leaf, UnpackError>;

    /// Copy the valid leaves to the destination mirror
    fn map_members(&self, sink: &mut MapSink<'_>) -> Result<(), UnpackError> {
        self.visit_valid(0, sink)
    }

    /// Calibrate the valid leaves into the destination mirror
    fn calib_members(&self, sink: &mut CalibSink<'_>) -> Result<(), UnpackError> {
        self.visit_valid(0, sink)
    }

    fn watch_members(&self, watcher: &mut Watcher) -> Result<(), UnpackError> {
        self.visit_valid(0, watcher)
    }

    /// Add the flat index of every non-zero leaf to the correlation list
    fn add_corr_members(&self, corr: &mut CorrelationList) -> Result<(), UnpackError> {
        self.visit_valid(0, corr)
    }
}

/// Implement [`Members`] for a structure with named members.
///
/// Members are listed in declaration order as `field: "Name"`, optionally followed by
/// `@ "unit"`. The position in the list is the member's route step.
///
/// ```ignore
/// impl_members!(SstHeader {
///     module: "module",
///     count: "count",
/// });
/// ```
#[macro_export]
macro_rules! impl_members {
    ($ty:ty { $($field:ident : $name:literal $(@ $unit:literal)?),* $(,)? }) => {
        impl $crate::members::Members for $ty {
            fn leaf_count(&self) -> usize {
                0 $(+ $crate::members::Members::leaf_count(&self.$field))*
            }

            fn clean(&mut self) {
                $($crate::members::Members::clean(&mut self.$field);)*
            }

            fn dump(&self, id: &$crate::signal_id::SignalId, pp: &mut $crate::members::PrettyPrinter) {
                $($crate::members::Members::dump(&self.$field, &id.with_name($name), pp);)*
            }

            fn show_members(
                &self,
                id: &$crate::signal_id::SignalId,
                _unit: Option<&'static str>,
                pp: &mut $crate::members::PrettyPrinter,
            ) {
                $(
                    let unit: Option<&'static str> = None $(.or(Some($unit)))?;
                    $crate::members::Members::show_members(&self.$field, &id.with_name($name), unit, pp);
                )*
            }

            #[allow(unused_assignments)]
            fn enumerate_members(
                &self,
                id: &$crate::signal_id::SignalId,
                flat: usize,
                mode: $crate::members::EnumerateMode,
                _unit: Option<&'static str>,
                visitor: &mut dyn $crate::members::EnumerateVisitor,
            ) {
                let mut base = flat;
                $(
                    let unit: Option<&'static str> = None $(.or(Some($unit)))?;
                    $crate::members::Members::enumerate_members(&self.$field, &id.with_name($name), base, mode, unit, visitor);
                    base += $crate::members::Members::leaf_count(&self.$field);
                )*
            }

            #[allow(unused_assignments)]
            fn zero_suppress_info_ptrs(
                &self,
                walk: &mut $crate::zero_suppress_info::ZzpWalk<'_>,
            ) -> Result<(), $crate::error::RegistryError> {
                let mut step = 0;
                let mut offset = 0;
                $(
                    walk.descend(step, offset, |w| $crate::members::Members::zero_suppress_info_ptrs(&self.$field, w))?;
                    step += 1;
                    offset += $crate::members::Members::leaf_count(&self.$field);
                )*
                Ok(())
            }

            #[allow(unused_assignments)]
            fn visit_valid(
                &self,
                flat: usize,
                visitor: &mut dyn $crate::members::LeafVisitor,
            ) -> Result<(), $crate::error::UnpackError> {
                let mut base = flat;
                $(
                    $crate::members::Members::visit_valid(&self.$field, base, visitor)?;
                    base += $crate::members::Members::leaf_count(&self.$field);
                )*
                Ok(())
            }

            #[allow(unused_assignments)]
            fn locate_mut(
                &mut self,
                route: &[usize],
            ) -> Result<&mut dyn $crate::leaf::Leaf, $crate::error::UnpackError> {
                let Some((&step, rest)) = route.split_first() else {
                    return Err($crate::error::UnpackError::BadRoute(route.to_vec()));
                };
                let mut ordinal = 0;
                $(
                    if step == ordinal {
                        return $crate::members::Members::locate_mut(&mut self.$field, rest);
                    }
                    ordinal += 1;
                )*
                Err($crate::error::UnpackError::BadRoute(route.to_vec()))
            }
        }
    };
}
