use std::panic::Location;

use super::error::{RegistryError, Site, UnpackError, ZeroSuppressError};
use super::leaf::Leaf;
use super::members::{
    EnumerateMode, EnumerateVisitor, LeafVisitor, LimitInfo, Members, PrettyPrinter,
};
use super::signal_id::SignalId;
use super::zero_suppress_info::{ZzpKind, ZzpWalk};

/// An append-only list of up to N items with no index key.
///
/// Items keep their insertion order; the "index" of an item is its entry number.
#[derive(Debug, Clone)]
pub struct RawListIiZeroSuppress<T, const N: usize> {
    num_items: usize,
    items: Vec<T>,
}

impl<T: Default, const N: usize> Default for RawListIiZeroSuppress<T, N> {
    fn default() -> Self {
        Self {
            num_items: 0,
            items: (0..N).map(|_| T::default()).collect(),
        }
    }
}

impl<T, const N: usize> RawListIiZeroSuppress<T, N> {
    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.num_items
    }

    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    pub fn items(&self) -> &[T] {
        &self.items[..self.num_items]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items().iter()
    }
}

impl<T: Members, const N: usize> RawListIiZeroSuppress<T, N> {
    /// Append a new item, reporting the caller when the list is full
    #[track_caller]
    pub fn append_item(&mut self) -> Result<&mut T, ZeroSuppressError> {
        let site = Site(Some(Location::caller()));
        let pos = self.append(site)?;
        Ok(&mut self.items[pos])
    }

    /// Get item `entry`, appending it if it is the next one
    #[track_caller]
    pub fn insert_index(&mut self, entry: usize) -> Result<&mut T, ZeroSuppressError> {
        let pos = self.do_insert_index(entry, Site(Some(Location::caller())))?;
        Ok(&mut self.items[pos])
    }

    pub fn on_insert_index(&mut self, entry: usize) -> Result<&mut T, ZeroSuppressError> {
        let pos = self.do_insert_index(entry, Site(None))?;
        Ok(&mut self.items[pos])
    }

    /// Insert callback of the zero-suppression protocol; returns the item offset
    pub fn zzp_on_insert_index(&mut self, entry: usize) -> Result<usize, ZeroSuppressError> {
        self.do_insert_index(entry, Site(None))
    }

    fn do_insert_index(&mut self, entry: usize, site: Site) -> Result<usize, ZeroSuppressError> {
        if entry >= N {
            return Err(ZeroSuppressError::IndexOutOfRange {
                kind: ZzpKind::ListIi,
                index: entry,
                capacity: N,
                site,
            });
        }
        match entry.cmp(&self.num_items) {
            std::cmp::Ordering::Less => Ok(entry),
            std::cmp::Ordering::Equal => self.append(site),
            std::cmp::Ordering::Greater => Err(ZeroSuppressError::NonSequentialEntry {
                kind: ZzpKind::ListIi,
                entry,
                count: self.num_items,
            }),
        }
    }

    fn append(&mut self, site: Site) -> Result<usize, ZeroSuppressError> {
        let pos = self.num_items;
        if pos >= N {
            return Err(ZeroSuppressError::ListFull {
                kind: ZzpKind::ListIi,
                index: pos,
                capacity: N,
                site,
            });
        }
        self.items[pos].clean();
        self.num_items = pos + 1;
        Ok(pos)
    }

    fn stride(&self) -> usize {
        self.items.first().map_or(0, |item| item.leaf_count())
    }
}

impl<T: Members, const N: usize> Members for RawListIiZeroSuppress<T, N> {
    fn leaf_count(&self) -> usize {
        N * self.stride()
    }

    fn clean(&mut self) {
        self.num_items = 0;
    }

    fn dump(&self, id: &SignalId, pp: &mut PrettyPrinter) {
        for (entry, item) in self.iter().enumerate() {
            item.dump(&id.with_index(entry), pp);
        }
    }

    fn show_members(&self, id: &SignalId, unit: Option<&'static str>, pp: &mut PrettyPrinter) {
        pp.line(id, format_args!("{}[{N}]", ZzpKind::ListIi));
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
                    kind: ZzpKind::ListIi,
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
            walk.descend_zero_suppressed(ZzpKind::ListIi, 0, i, i, i * stride, |w| {
                item.zero_suppress_info_ptrs(w)
            })?;
        }
        Ok(())
    }

    fn visit_valid(&self, flat: usize, visitor: &mut dyn LeafVisitor) -> Result<(), UnpackError> {
        let stride = self.stride();
        for (entry, item) in self.iter().enumerate() {
            item.visit_valid(flat + entry * stride, visitor)?;
        }
        Ok(())
    }

    fn locate_mut(&mut self, route: &[usize]) -> Result<&mut dyn Leaf, UnpackError> {
        let Some((&entry, rest)) = route.split_first() else {
            return Err(UnpackError::BadRoute(route.to_vec()));
        };
        let pos = self.zzp_on_insert_index(entry)?;
        self.items[pos].locate_mut(rest)
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_kept() {
        let mut list = RawListIiZeroSuppress::<u32, 8>::default();
        for value in [30, 10, 20] {
            *list.append_item().unwrap() = value;
        }
        assert_eq!(list.items(), &[30, 10, 20]);
    }

    #[test]
    fn test_full_list() {
        let mut list = RawListIiZeroSuppress::<u8, 2>::default();
        list.append_item().unwrap();
        list.append_item().unwrap();
        assert!(matches!(
            list.append_item(),
            Err(ZeroSuppressError::ListFull { capacity: 2, .. })
        ));
        list.clean();
        assert!(list.append_item().is_ok());
    }

    #[test]
    fn test_insert_index_by_entry() {
        let mut list = RawListIiZeroSuppress::<u16, 4>::default();
        *list.insert_index(0).unwrap() = 5;
        *list.insert_index(0).unwrap() += 1;
        assert_eq!(list.items(), &[6]);
        assert!(matches!(
            list.insert_index(2),
            Err(ZeroSuppressError::NonSequentialEntry { entry: 2, count: 1, .. })
        ));
    }
}
