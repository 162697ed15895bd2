use std::panic::Location;

use super::bitsone::BitsOne;
use super::error::{RegistryError, Site, UnpackError, ZeroSuppressError};
use super::leaf::Leaf;
use super::members::{
    EnumerateMode, EnumerateVisitor, LeafVisitor, LimitInfo, Members, PrettyPrinter,
};
use super::signal_id::SignalId;
use super::zero_suppress_info::{ZzpKind, ZzpWalk};

/// A zero-suppressed array where each of the N slots holds up to M entries.
///
/// Typical use is a multi-hit TDC channel. Entry `j` of slot `i` is stored at offset
/// `i * M + j`; the bitset marks touched slots and the per-slot count is reset on
/// first touch, so `clean` stays O(1).
#[derive(Debug, Clone)]
pub struct RawArrayMultiZeroSuppress<T, const N: usize, const M: usize> {
    valid: BitsOne<N>,
    counts: Vec<usize>,
    items: Vec<T>,
}

impl<T: Default, const N: usize, const M: usize> Default for RawArrayMultiZeroSuppress<T, N, M> {
    fn default() -> Self {
        Self {
            valid: BitsOne::new(),
            counts: vec![0; N],
            items: (0..N * M).map(|_| T::default()).collect(),
        }
    }
}

impl<T, const N: usize, const M: usize> RawArrayMultiZeroSuppress<T, N, M> {
    pub const fn capacity(&self) -> usize {
        N
    }

    pub const fn multiplicity(&self) -> usize {
        M
    }

    /// Number of entries in slot `index` this event
    pub fn count(&self, index: usize) -> usize {
        if index < N && self.valid.get(index) {
            self.counts[index]
        } else {
            0
        }
    }

    /// The entries of slot `index`, empty if the slot was not touched
    pub fn entries(&self, index: usize) -> &[T] {
        let count = self.count(index);
        let start = index * M;
        &self.items[start..start + count]
    }

    /// Touched slots in ascending order, with their entries
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[T])> + '_ {
        self.valid.iter().map(move |i| (i, self.entries(i)))
    }

    pub fn valid(&self) -> &BitsOne<N> {
        &self.valid
    }
}

impl<T: Members, const N: usize, const M: usize> RawArrayMultiZeroSuppress<T, N, M> {
    /// Append an entry to slot `index`, reporting the caller on failure
    #[track_caller]
    pub fn insert_index(&mut self, index: usize) -> Result<&mut T, ZeroSuppressError> {
        let site = Site(Some(Location::caller()));
        let offset = self.append_entry(index, site)?;
        Ok(&mut self.items[offset])
    }

    pub fn on_insert_index(&mut self, index: usize) -> Result<&mut T, ZeroSuppressError> {
        let offset = self.append_entry(index, Site(None))?;
        Ok(&mut self.items[offset])
    }

    /// Insert callback of the zero-suppression protocol: append to the slot and
    /// return the offset of the new entry
    pub fn zzp_on_insert_index(&mut self, index: usize) -> Result<usize, ZeroSuppressError> {
        self.append_entry(index, Site(None))
    }

    /// Get entry `entry` of slot `index`, appending it if it is the next one.
    ///
    /// Used when mirroring another container: entries arrive in order, and each member
    /// of an entry locates the same entry again.
    pub fn insert_entry(&mut self, index: usize, entry: usize) -> Result<usize, ZeroSuppressError> {
        let count = self.touch(index, Site(None))?;
        if entry < count {
            return Ok(index * M + entry);
        }
        if entry >= M {
            return Err(ZeroSuppressError::TooManyEntries {
                kind: ZzpKind::ArrayMulti,
                index,
                max: M,
                site: Site(None),
            });
        }
        if entry > count {
            return Err(ZeroSuppressError::NonSequentialEntry {
                kind: ZzpKind::ArrayMulti,
                entry,
                count,
            });
        }
        self.append_entry(index, Site(None))
    }

    /// Mark the slot and return its current count, resetting it on first touch
    fn touch(&mut self, index: usize, site: Site) -> Result<usize, ZeroSuppressError> {
        if index >= N {
            return Err(ZeroSuppressError::IndexOutOfRange {
                kind: ZzpKind::ArrayMulti,
                index,
                capacity: N,
                site,
            });
        }
        if !self.valid.get_set(index) {
            self.counts[index] = 0;
        }
        Ok(self.counts[index])
    }

    fn append_entry(&mut self, index: usize, site: Site) -> Result<usize, ZeroSuppressError> {
        let count = self.touch(index, site)?;
        if count >= M {
            return Err(ZeroSuppressError::TooManyEntries {
                kind: ZzpKind::ArrayMulti,
                index,
                max: M,
                site,
            });
        }
        self.counts[index] = count + 1;
        let offset = index * M + count;
        self.items[offset].clean();
        Ok(offset)
    }

    fn stride(&self) -> usize {
        self.items.first().map_or(0, |item| item.leaf_count())
    }
}

impl<T: Members, const N: usize, const M: usize> Members for RawArrayMultiZeroSuppress<T, N, M> {
    fn leaf_count(&self) -> usize {
        N * M * self.stride()
    }

    fn clean(&mut self) {
        self.valid.clear();
    }

    fn dump(&self, id: &SignalId, pp: &mut PrettyPrinter) {
        for (i, entries) in self.iter() {
            let slot_id = id.with_index(i);
            for (j, item) in entries.iter().enumerate() {
                item.dump(&slot_id.with_index(j), pp);
            }
        }
    }

    fn show_members(&self, id: &SignalId, unit: Option<&'static str>, pp: &mut PrettyPrinter) {
        pp.line(id, format_args!("{}[{N}][{M}]", ZzpKind::ArrayMulti));
        if let Some(item) = self.items.first() {
            item.show_members(&id.with_dim(N).with_dim(M), unit, pp);
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
        let (slots, entries) = match mode {
            EnumerateMode::Discovery => (N.min(1), M.min(1)),
            EnumerateMode::All => {
                visitor.limit(&LimitInfo {
                    id,
                    flat,
                    kind: ZzpKind::ArrayMulti,
                    capacity: N,
                    multiplicity: M,
                });
                (N, M)
            }
        };
        for i in 0..slots {
            let slot_id = id.with_index(i);
            for j in 0..entries {
                let offset = i * M + j;
                self.items[offset].enumerate_members(
                    &slot_id.with_index(j),
                    flat + offset * stride,
                    mode,
                    unit,
                    visitor,
                );
            }
        }
    }

    fn zero_suppress_info_ptrs(&self, walk: &mut ZzpWalk<'_>) -> Result<(), RegistryError> {
        let stride = self.stride();
        for (offset, item) in self.items.iter().enumerate() {
            walk.descend_zero_suppressed(
                ZzpKind::ArrayMulti,
                offset / M,
                offset % M,
                offset,
                offset * stride,
                |w| item.zero_suppress_info_ptrs(w),
            )?;
        }
        Ok(())
    }

    fn visit_valid(&self, flat: usize, visitor: &mut dyn LeafVisitor) -> Result<(), UnpackError> {
        let stride = self.stride();
        for (i, entries) in self.iter() {
            for (j, item) in entries.iter().enumerate() {
                item.visit_valid(flat + (i * M + j) * stride, visitor)?;
            }
        }
        Ok(())
    }

    fn locate_mut(&mut self, route: &[usize]) -> Result<&mut dyn Leaf, UnpackError> {
        let Some((&step, rest)) = route.split_first() else {
            return Err(UnpackError::BadRoute(route.to_vec()));
        };
        if M == 0 {
            return Err(UnpackError::BadRoute(route.to_vec()));
        }
        let offset = self.insert_entry(step / M, step % M)?;
        self.items[offset].locate_mut(rest)
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::Value;

    #[test]
    fn test_multiplicity_limit() {
        let mut tdc = RawArrayMultiZeroSuppress::<u16, 8, 3>::default();
        for hit in 0..3 {
            *tdc.insert_index(4).unwrap() = 10 + hit;
        }
        assert!(matches!(
            tdc.insert_index(4),
            Err(ZeroSuppressError::TooManyEntries { index: 4, max: 3, .. })
        ));
        // Other slots are unaffected by a full neighbour
        *tdc.insert_index(5).unwrap() = 99;
        assert_eq!(tdc.entries(4), &[10, 11, 12]);
        assert_eq!(tdc.entries(5), &[99]);
        assert_eq!(tdc.count(6), 0);
    }

    #[test]
    fn test_clean_resets_counts() {
        let mut tdc = RawArrayMultiZeroSuppress::<u16, 4, 2>::default();
        tdc.insert_index(1).unwrap();
        tdc.insert_index(1).unwrap();
        tdc.clean();
        assert_eq!(tdc.count(1), 0);
        *tdc.insert_index(1).unwrap() = 3;
        assert_eq!(tdc.entries(1), &[3]);
    }

    #[test]
    fn test_insert_entry_is_sequential() {
        let mut tdc = RawArrayMultiZeroSuppress::<u32, 4, 4>::default();
        assert_eq!(tdc.insert_entry(2, 0).unwrap(), 8);
        assert_eq!(tdc.insert_entry(2, 0).unwrap(), 8);
        assert_eq!(tdc.insert_entry(2, 1).unwrap(), 9);
        assert!(matches!(
            tdc.insert_entry(2, 3),
            Err(ZeroSuppressError::NonSequentialEntry { entry: 3, count: 2, .. })
        ));
        assert_eq!(tdc.count(2), 2);
    }

    #[test]
    fn test_visit_and_locate() {
        let mut src = RawArrayMultiZeroSuppress::<u32, 4, 2>::default();
        *src.insert_index(3).unwrap() = 7;
        *src.insert_index(0).unwrap() = 1;
        *src.insert_index(3).unwrap() = 8;

        let mut dest = RawArrayMultiZeroSuppress::<u32, 4, 2>::default();
        src.visit_valid(0, &mut |flat: usize, leaf: &dyn Leaf| -> Result<(), UnpackError> {
            dest.locate_mut(&[flat])?.set_value(leaf.value());
            Ok(())
        })
        .unwrap();
        assert_eq!(dest.entries(0), &[1]);
        assert_eq!(dest.entries(3), &[7, 8]);
        assert_eq!(dest.locate_mut(&[7]).unwrap().value(), Value::Uint(8));
    }
}
