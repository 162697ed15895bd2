use std::panic::Location;

use super::bitsone::BitsOne;
use super::error::{RegistryError, Site, UnpackError, ZeroSuppressError};
use super::leaf::Leaf;
use super::members::{
    EnumerateMode, EnumerateVisitor, LeafVisitor, LimitInfo, Members, PrettyPrinter,
};
use super::raw_array::RawArray;
use super::signal_id::SignalId;
use super::zero_suppress_info::{ZzpKind, ZzpWalk};

/// An array of N slots where only the slots marked in a bitset hold data.
///
/// `clean` only clears the bitset. A slot's payload is cleaned the first time the
/// slot is touched in an event, so the cost per event follows the number of hits,
/// not the capacity.
#[derive(Debug, Clone)]
pub struct RawArrayZeroSuppress<T, const N: usize> {
    valid: BitsOne<N>,
    items: Vec<T>,
}

/// A zero-suppressed array whose slots are dense arrays of N1 items.
///
/// Only the outer index is sparse.
pub type RawArrayZeroSuppress1<T, const N: usize, const N1: usize> =
    RawArrayZeroSuppress<RawArray<T, N1>, N>;

/// A zero-suppressed array whose slots are dense N1 x N2 arrays
pub type RawArrayZeroSuppress2<T, const N: usize, const N1: usize, const N2: usize> =
    RawArrayZeroSuppress<RawArray<RawArray<T, N2>, N1>, N>;

impl<T: Default, const N: usize> Default for RawArrayZeroSuppress<T, N> {
    fn default() -> Self {
        Self {
            valid: BitsOne::new(),
            items: (0..N).map(|_| T::default()).collect(),
        }
    }
}

impl<T, const N: usize> RawArrayZeroSuppress<T, N> {
    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn is_valid(&self, index: usize) -> bool {
        index < N && self.valid.get(index)
    }

    /// The item at `index` if it was written this event
    pub fn get(&self, index: usize) -> Option<&T> {
        if self.is_valid(index) {
            self.items.get(index)
        } else {
            None
        }
    }

    /// The validity mask
    pub fn valid(&self) -> &BitsOne<N> {
        &self.valid
    }

    /// Number of valid slots
    pub fn len(&self) -> usize {
        self.valid.count()
    }

    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    /// Valid slots in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.valid.iter().map(move |i| (i, &self.items[i]))
    }
}

impl<T: Members, const N: usize> RawArrayZeroSuppress<T, N> {
    /// Get or create the slot at `index`, reporting the caller on failure
    #[track_caller]
    pub fn insert_index(&mut self, index: usize) -> Result<&mut T, ZeroSuppressError> {
        self.do_insert_index(index, Site(Some(Location::caller())))
    }

    pub fn on_insert_index(&mut self, index: usize) -> Result<&mut T, ZeroSuppressError> {
        self.do_insert_index(index, Site(None))
    }

    /// Insert callback of the zero-suppression protocol; returns the slot offset
    pub fn zzp_on_insert_index(&mut self, index: usize) -> Result<usize, ZeroSuppressError> {
        self.on_insert_index(index)?;
        Ok(index)
    }

    fn do_insert_index(&mut self, index: usize, site: Site) -> Result<&mut T, ZeroSuppressError> {
        if index >= N {
            return Err(ZeroSuppressError::IndexOutOfRange {
                kind: ZzpKind::Array,
                index,
                capacity: N,
                site,
            });
        }
        let item = &mut self.items[index];
        if !self.valid.get_set(index) {
            item.clean();
        }
        Ok(item)
    }

    fn stride(&self) -> usize {
        self.items.first().map_or(0, |item| item.leaf_count())
    }
}

impl<T: Members, const N: usize> Members for RawArrayZeroSuppress<T, N> {
    fn leaf_count(&self) -> usize {
        N * self.stride()
    }

    fn clean(&mut self) {
        self.valid.clear();
    }

    fn dump(&self, id: &SignalId, pp: &mut PrettyPrinter) {
        for (i, item) in self.iter() {
            item.dump(&id.with_index(i), pp);
        }
    }

    fn show_members(&self, id: &SignalId, unit: Option<&'static str>, pp: &mut PrettyPrinter) {
        pp.line(id, format_args!("{}[{N}]", ZzpKind::Array));
        if let Some(item) = self.items.first() {
            item.show_members(&id.with_dim(N), unit, pp);
        }
    }

    fn enumerate_members(
        &self,
        id: &SignalId,
        flat: usize,
        mode: EnumerateMode,
        unit: Option<&'static str>,
        visitor: &mut dyn EnumerateVisitor,
    ) {
        let stride = self.stride();
        let shown = match mode {
            EnumerateMode::Discovery => N.min(1),
            EnumerateMode::All => {
                visitor.limit(&LimitInfo {
                    id,
                    flat,
                    kind: ZzpKind::Array,
                    capacity: N,
                    multiplicity: 1,
                });
                N
            }
        };
        for (i, item) in self.items.iter().take(shown).enumerate() {
            item.enumerate_members(&id.with_index(i), flat + i * stride, mode, unit, visitor);
        }
    }

    fn zero_suppress_info_ptrs(&self, walk: &mut ZzpWalk<'_>) -> Result<(), RegistryError> {
        let stride = self.stride();
        for (i, item) in self.items.iter().enumerate() {
            walk.descend_zero_suppressed(ZzpKind::Array, i, 0, i, i * stride, |w| {
                item.zero_suppress_info_ptrs(w)
            })?;
        }
        Ok(())
    }

    fn visit_valid(&self, flat: usize, visitor: &mut dyn LeafVisitor) -> Result<(), UnpackError> {
        let stride = self.stride();
        for (i, item) in self.iter() {
            item.visit_valid(flat + i * stride, visitor)?;
        }
        Ok(())
    }

    fn locate_mut(&mut self, route: &[usize]) -> Result<&mut dyn Leaf, UnpackError> {
        let Some((&index, rest)) = route.split_first() else {
            return Err(UnpackError::BadRoute(route.to_vec()));
        };
        let offset = self.zzp_on_insert_index(index)?;
        self.items[offset].locate_mut(rest)
    }
}
