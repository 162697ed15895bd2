use std::panic::Location;

use super::error::{RegistryError, Site, UnpackError, ZeroSuppressError};
use super::leaf::Leaf;
use super::members::{
    EnumerateMode, EnumerateVisitor, LeafVisitor, LimitInfo, Members, PrettyPrinter,
};
use super::signal_id::SignalId;
use super::zero_suppress_info::{ZzpKind, ZzpWalk};

#[derive(Debug, Clone, Default)]
struct ListItem<T> {
    index: usize,
    item: T,
}

/// A packed list of (index, item) pairs kept sorted by index, for index spaces where a
/// full bitset per event is wasteful.
///
/// Hardware usually reports channels in ascending order, so the common insertion is an
/// append. Out of order inserts binary search and shift the tail up by one slot.
#[derive(Debug, Clone)]
pub struct RawListZeroSuppress<T, const N: usize> {
    num_items: usize,
    items: Vec<ListItem<T>>,
}

impl<T: Default, const N: usize> Default for RawListZeroSuppress<T, N> {
    fn default() -> Self {
        Self {
            num_items: 0,
            items: (0..N).map(|_| ListItem::default()).collect(),
        }
    }
}

impl<T, const N: usize> RawListZeroSuppress<T, N> {
    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.num_items
    }

    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    /// Position of `index` in the packed list
    fn find(&self, index: usize) -> Result<usize, usize> {
        self.items[..self.num_items].binary_search_by_key(&index, |entry| entry.index)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.find(index).ok().map(|pos| &self.items[pos].item)
    }

    /// Items in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.items[..self.num_items]
            .iter()
            .map(|entry| (entry.index, &entry.item))
    }

    /// The stored indices, in storage order
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.items[..self.num_items].iter().map(|entry| entry.index)
    }
}

impl<T: Members, const N: usize> RawListZeroSuppress<T, N> {
    /// Get or create the item for `index`, reporting the caller on failure
    #[track_caller]
    pub fn insert_index(&mut self, index: usize) -> Result<&mut T, ZeroSuppressError> {
        let pos = self.do_insert_index(index, Site(Some(Location::caller())))?;
        Ok(&mut self.items[pos].item)
    }

    pub fn on_insert_index(&mut self, index: usize) -> Result<&mut T, ZeroSuppressError> {
        let pos = self.do_insert_index(index, Site(None))?;
        Ok(&mut self.items[pos].item)
    }

    /// Insert callback of the zero-suppression protocol; returns the packed position
    /// of the item, i.e. its offset from the first item
    pub fn zzp_on_insert_index(&mut self, index: usize) -> Result<usize, ZeroSuppressError> {
        self.do_insert_index(index, Site(None))
    }

    fn do_insert_index(&mut self, index: usize, site: Site) -> Result<usize, ZeroSuppressError> {
        if index >= N {
            return Err(ZeroSuppressError::IndexOutOfRange {
                kind: ZzpKind::List,
                index,
                capacity: N,
                site,
            });
        }
        let n = self.num_items;
        if n == 0 || index > self.items[n - 1].index {
            return self.insert_at(n, index, site);
        }
        if index == self.items[n - 1].index {
            return Ok(n - 1);
        }
        match self.find(index) {
            Ok(pos) => Ok(pos),
            Err(pos) => self.insert_at(pos, index, site),
        }
    }

    fn insert_at(&mut self, pos: usize, index: usize, site: Site) -> Result<usize, ZeroSuppressError> {
        let n = self.num_items;
        if n >= N {
            return Err(ZeroSuppressError::ListFull {
                kind: ZzpKind::List,
                index,
                capacity: N,
                site,
            });
        }
        if pos < n {
            // The unused pool entry at n wraps around to pos
            self.items[pos..=n].rotate_right(1);
        }
        let entry = &mut self.items[pos];
        entry.index = index;
        entry.item.clean();
        self.num_items = n + 1;
        Ok(pos)
    }

    fn stride(&self) -> usize {
        self.items.first().map_or(0, |entry| entry.item.leaf_count())
    }
}

impl<T: Members, const N: usize> Members for RawListZeroSuppress<T, N> {
    fn leaf_count(&self) -> usize {
        N * self.stride()
    }

    fn clean(&mut self) {
        self.num_items = 0;
    }

    fn dump(&self, id: &SignalId, pp: &mut PrettyPrinter) {
        for (index, item) in self.iter() {
            item.dump(&id.with_index(index), pp);
        }
    }

    fn show_members(&self, id: &SignalId, unit: Option<&'static str>, pp: &mut PrettyPrinter) {
        pp.line(id, format_args!("{}[{N}]", ZzpKind::List));
        if let Some(entry) = self.items.first() {
            entry.item.show_members(&id.with_dim(N), unit, pp);
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
                    kind: ZzpKind::List,
                    capacity: N,
                    multiplicity: 1,
                });
                N
            }
        };
        // Pool entries only lend their shape here; index i is not stored at position i
        for (i, entry) in self.items.iter().take(shown).enumerate() {
            entry
                .item
                .enumerate_members(&id.with_index(i), flat + i * stride, mode, unit, visitor);
        }
    }

    fn zero_suppress_info_ptrs(&self, walk: &mut ZzpWalk<'_>) -> Result<(), RegistryError> {
        let stride = self.stride();
        for (i, entry) in self.items.iter().enumerate() {
            walk.descend_zero_suppressed(ZzpKind::List, i, 0, i, i * stride, |w| {
                entry.item.zero_suppress_info_ptrs(w)
            })?;
        }
        Ok(())
    }

    fn visit_valid(&self, flat: usize, visitor: &mut dyn LeafVisitor) -> Result<(), UnpackError> {
        let stride = self.stride();
        for (index, item) in self.iter() {
            item.visit_valid(flat + index * stride, visitor)?;
        }
        Ok(())
    }

    fn locate_mut(&mut self, route: &[usize]) -> Result<&mut dyn Leaf, UnpackError> {
        let Some((&index, rest)) = route.split_first() else {
            return Err(UnpackError::BadRoute(route.to_vec()));
        };
        let pos = self.zzp_on_insert_index(index)?;
        self.items[pos].item.locate_mut(rest)
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    fn assert_sorted<T, const N: usize>(list: &RawListZeroSuppress<T, N>) {
        let indices: Vec<usize> = list.indices().collect();
        assert!(
            indices.windows(2).all(|w| w[0] < w[1]),
            "not strictly sorted: {indices:?}"
        );
    }

    #[test]
    fn test_permutations_stay_sorted() {
        // Visit 0..97 in several scrambled orders (multipliers coprime to 97)
        for stride in [1usize, 5, 13, 31, 96] {
            let mut list = RawListZeroSuppress::<u32, 97>::default();
            for step in 0..97 {
                let index = (step * stride) % 97;
                *list.insert_index(index).unwrap() = index as u32 * 10;
                assert_sorted(&list);
            }
            assert_eq!(list.len(), 97);
            for (index, value) in list.iter() {
                assert_eq!(*value, index as u32 * 10);
            }
        }
    }

    #[test]
    fn test_reinsert_returns_same_item() {
        let mut list = RawListZeroSuppress::<u32, 64>::default();
        for index in [40, 10, 20, 30] {
            *list.insert_index(index).unwrap() = 1;
        }
        let before = list.len();
        for index in [10, 20, 30, 40] {
            let pos = list.zzp_on_insert_index(index).unwrap();
            assert_eq!(pos, list.find(index).unwrap());
            *list.insert_index(index).unwrap() += 1;
        }
        assert_eq!(list.len(), before);
        assert_eq!(list.get(20), Some(&2));
        assert_eq!(list.get(25), None);
    }

    #[test]
    fn test_append_fast_path_and_middle_insert() {
        let mut list = RawListZeroSuppress::<u16, 16>::default();
        assert_eq!(list.zzp_on_insert_index(2).unwrap(), 0);
        assert_eq!(list.zzp_on_insert_index(8).unwrap(), 1);
        assert_eq!(list.zzp_on_insert_index(12).unwrap(), 2);
        // Shifts 8 and 12 up by one
        assert_eq!(list.zzp_on_insert_index(5).unwrap(), 1);
        assert_eq!(list.indices().collect::<Vec<_>>(), vec![2, 5, 8, 12]);
    }

    #[test]
    fn test_payload_moves_with_shift() {
        let mut list = RawListZeroSuppress::<u16, 8>::default();
        *list.insert_index(6).unwrap() = 60;
        *list.insert_index(7).unwrap() = 70;
        *list.insert_index(1).unwrap() = 10;
        let pairs: Vec<(usize, u16)> = list.iter().map(|(i, v)| (i, *v)).collect();
        assert_eq!(pairs, vec![(1, 10), (6, 60), (7, 70)]);
    }

    #[test]
    fn test_clean_and_range() {
        let mut list = RawListZeroSuppress::<u8, 4>::default();
        *list.insert_index(3).unwrap() = 9;
        list.clean();
        assert!(list.is_empty());
        assert_eq!(*list.insert_index(3).unwrap(), 0);
        assert!(matches!(
            list.insert_index(4),
            Err(ZeroSuppressError::IndexOutOfRange { index: 4, .. })
        ));
    }
}
