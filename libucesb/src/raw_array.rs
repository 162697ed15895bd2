use std::ops::{Index, IndexMut};

use super::error::{RegistryError, UnpackError};
use super::leaf::Leaf;
use super::members::{EnumerateMode, EnumerateVisitor, LeafVisitor, Members, PrettyPrinter};
use super::signal_id::SignalId;
use super::zero_suppress_info::ZzpWalk;

/// A dense array of N items, all of which are always valid.
///
/// Used for header and control fields that are present in every event, and as the
/// inner dense dimensions of the `_1`/`_2` composite containers.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArray<T, const N: usize> {
    items: Vec<T>,
}

impl<T: Default, const N: usize> Default for RawArray<T, N> {
    fn default() -> Self {
        Self {
            items: (0..N).map(|_| T::default()).collect(),
        }
    }
}

impl<T, const N: usize> RawArray<T, N> {
    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }
}

impl<T, const N: usize> Index<usize> for RawArray<T, N> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T, const N: usize> IndexMut<usize> for RawArray<T, N> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }
}

impl<T: Members, const N: usize> RawArray<T, N> {
    fn stride(&self) -> usize {
        self.items.first().map_or(0, |item| item.leaf_count())
    }
}

impl<T: Members, const N: usize> Members for RawArray<T, N> {
    fn leaf_count(&self) -> usize {
        N * self.stride()
    }

    fn clean(&mut self) {
        for item in self.items.iter_mut() {
            item.clean();
        }
    }

    fn dump(&self, id: &SignalId, pp: &mut PrettyPrinter) {
        for (i, item) in self.items.iter().enumerate() {
            item.dump(&id.with_index(i), pp);
        }
    }

    fn show_members(&self, id: &SignalId, unit: Option<&'static str>, pp: &mut PrettyPrinter) {
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
            EnumerateMode::All => N,
        };
        for (i, item) in self.items.iter().take(shown).enumerate() {
            item.enumerate_members(&id.with_index(i), flat + i * stride, mode, unit, visitor);
        }
    }

    fn zero_suppress_info_ptrs(&self, walk: &mut ZzpWalk<'_>) -> Result<(), RegistryError> {
        let stride = self.stride();
        for (i, item) in self.items.iter().enumerate() {
            walk.descend_fixed(i, i * stride, |w| item.zero_suppress_info_ptrs(w))?;
        }
        Ok(())
    }

    fn visit_valid(&self, flat: usize, visitor: &mut dyn LeafVisitor) -> Result<(), UnpackError> {
        let stride = self.stride();
        for (i, item) in self.items.iter().enumerate() {
            item.visit_valid(flat + i * stride, visitor)?;
        }
        Ok(())
    }

    fn locate_mut(&mut self, route: &[usize]) -> Result<&mut dyn Leaf, UnpackError> {
        match route.split_first() {
            Some((&i, rest)) if i < N => self.items[i].locate_mut(rest),
            _ => Err(UnpackError::BadRoute(route.to_vec())),
        }
    }
}
