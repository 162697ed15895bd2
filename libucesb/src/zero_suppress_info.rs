//! Zero-suppression descriptors and their registry.
//!
//! A mapped or calibrated destination leaf may live inside a zero-suppressed container.
//! Writing it then also means marking (or inserting) the slot of that container. The
//! descriptor registered for each leaf at session setup records which container, which
//! slot and how that container inserts, so the mapping layer can write any destination
//! without knowing the container types involved.
use std::collections::BTreeMap;
use std::fmt;

use fxhash::FxHashMap;

use super::error::RegistryError;

/// The mirror an address belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Unpack,
    Raw,
    Cal,
}

impl Level {
    pub fn name(&self) -> &'static str {
        match self {
            Level::Unpack => "unpack",
            Level::Raw => "raw",
            Level::Cal => "cal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Address of a leaf: its flat index within one mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeafAddr {
    pub level: Level,
    pub flat: usize,
}

impl LeafAddr {
    pub fn new(level: Level, flat: usize) -> Self {
        Self { level, flat }
    }
}

impl fmt::Display for LeafAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.level, self.flat)
    }
}

/// The insertion discipline of a zero-suppressed container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZzpKind {
    /// Bitset gated array
    Array,
    /// Bitset gated array with up to M entries per slot
    ArrayMulti,
    /// Index sorted packed list
    List,
    /// Append only list
    ListIi,
}

impl ZzpKind {
    /// Whether the container places entries by appending rather than by index
    pub fn appends(&self) -> bool {
        matches!(self, ZzpKind::ArrayMulti | ZzpKind::ListIi)
    }
}

impl fmt::Display for ZzpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ZzpKind::Array => "raw_array_zero_suppress",
            ZzpKind::ArrayMulti => "raw_array_multi_zero_suppress",
            ZzpKind::List => "raw_list_zero_suppress",
            ZzpKind::ListIi => "raw_list_ii_zero_suppress",
        };
        write!(f, "{name}")
    }
}

/// The zero-suppressing container enclosing a leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZzpCall {
    pub kind: ZzpKind,
    /// Route from the mirror root to the container
    pub container: Vec<usize>,
    /// Flat index of the container's first leaf
    pub base: usize,
    /// The slot of the container holding the leaf (always 0 for append only lists)
    pub index: usize,
    /// Entry number within the slot, for containers that append
    pub entry: usize,
    /// Dense array dimensions between the sparse slot and the leaf
    pub dense_levels: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ZeroSuppressInfo {
    /// Plain member, always present
    #[default]
    None,
    /// Inside a dense array; the index is implied by the parent
    FixedList,
    /// Inside a zero-suppressed container, which must insert before the leaf is written
    Call(ZzpCall),
}

/// Flat tag names of a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZzpTag {
    None,
    FixedList,
    CallArrayIndex,
    CallArrayIndex1,
    CallArrayIndex2,
    CallArrayMultiIndex,
    CallListIndex,
    CallListIiIndex,
}

impl ZeroSuppressInfo {
    pub fn tag(&self) -> ZzpTag {
        match self {
            ZeroSuppressInfo::None => ZzpTag::None,
            ZeroSuppressInfo::FixedList => ZzpTag::FixedList,
            ZeroSuppressInfo::Call(call) => match (call.kind, call.dense_levels) {
                (ZzpKind::Array, 0) => ZzpTag::CallArrayIndex,
                (ZzpKind::Array, 1) => ZzpTag::CallArrayIndex1,
                (ZzpKind::Array, _) => ZzpTag::CallArrayIndex2,
                (ZzpKind::ArrayMulti, _) => ZzpTag::CallArrayMultiIndex,
                (ZzpKind::List, _) => ZzpTag::CallListIndex,
                (ZzpKind::ListIi, _) => ZzpTag::CallListIiIndex,
            },
        }
    }

    pub fn is_zero_suppressed(&self) -> bool {
        matches!(self, ZeroSuppressInfo::Call(_))
    }
}

/// What the registry knows about one leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZeroSuppressDescriptor {
    pub info: ZeroSuppressInfo,
    /// Route from the mirror root to the leaf
    pub route: Box<[usize]>,
}

/// Registry of the zero-suppression descriptor of every leaf of a session's mirrors.
///
/// Filled once during session setup, read-only afterwards.
#[derive(Debug, Default)]
pub struct ZeroSuppressRegistry {
    map: BTreeMap<LeafAddr, ZeroSuppressDescriptor>,
}

impl ZeroSuppressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the descriptor of a leaf. A leaf may only be registered once.
    pub fn insert(
        &mut self,
        addr: LeafAddr,
        descriptor: ZeroSuppressDescriptor,
    ) -> Result<(), RegistryError> {
        if self.map.contains_key(&addr) {
            return Err(RegistryError::Duplicate(addr));
        }
        self.map.insert(addr, descriptor);
        Ok(())
    }

    /// Look up a leaf. Returns `Ok(None)` for an unknown leaf only when `allow_missing`.
    pub fn get(
        &self,
        addr: LeafAddr,
        allow_missing: bool,
    ) -> Result<Option<&ZeroSuppressDescriptor>, RegistryError> {
        match self.map.get(&addr) {
            Some(desc) => Ok(Some(desc)),
            None if allow_missing => Ok(None),
            None => Err(RegistryError::Missing(addr)),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of registered leaves of a level that sit in zero-suppressed containers
    pub fn count_zero_suppressed(&self, level: Level) -> usize {
        self.map
            .range(LeafAddr::new(level, 0)..=LeafAddr::new(level, usize::MAX))
            .filter(|(_, desc)| desc.info.is_zero_suppressed())
            .count()
    }
}

/// State of the registration walk over one mirror.
///
/// Tracks the route and flat index of the current position and the descriptor that
/// applies to leaves below it.
#[derive(Debug)]
pub struct ZzpWalk<'r> {
    level: Level,
    route: Vec<usize>,
    flat: usize,
    info: ZeroSuppressInfo,
    registry: &'r mut ZeroSuppressRegistry,
}

impl<'r> ZzpWalk<'r> {
    pub fn new(level: Level, registry: &'r mut ZeroSuppressRegistry) -> Self {
        Self {
            level,
            route: Vec::new(),
            flat: 0,
            info: ZeroSuppressInfo::None,
            registry,
        }
    }

    pub fn flat(&self) -> usize {
        self.flat
    }

    pub fn route(&self) -> &[usize] {
        &self.route
    }

    pub fn info(&self) -> &ZeroSuppressInfo {
        &self.info
    }

    /// Descend into a structure member located `flat_offset` leaves after the current base
    pub fn descend<F>(&mut self, step: usize, flat_offset: usize, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut Self) -> Result<(), RegistryError>,
    {
        self.route.push(step);
        let base = self.flat;
        self.flat += flat_offset;
        let result = f(self);
        self.flat = base;
        self.route.pop();
        result
    }

    /// Descend into a slot of a dense array
    pub fn descend_fixed<F>(
        &mut self,
        index: usize,
        flat_offset: usize,
        f: F,
    ) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut Self) -> Result<(), RegistryError>,
    {
        let inner = match &self.info {
            ZeroSuppressInfo::None | ZeroSuppressInfo::FixedList => ZeroSuppressInfo::FixedList,
            ZeroSuppressInfo::Call(call) => ZeroSuppressInfo::Call(ZzpCall {
                dense_levels: call.dense_levels.saturating_add(1),
                ..call.clone()
            }),
        };
        let outer = std::mem::replace(&mut self.info, inner);
        let result = self.descend(index, flat_offset, f);
        self.info = outer;
        result
    }

    /// Descend into a slot of a zero-suppressed container.
    ///
    /// `step` is the route step selecting the slot (the slot index, or for multi
    /// arrays the entry position). Only one zero-suppressed level may enclose a leaf.
    pub fn descend_zero_suppressed<F>(
        &mut self,
        kind: ZzpKind,
        index: usize,
        entry: usize,
        step: usize,
        flat_offset: usize,
        f: F,
    ) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut Self) -> Result<(), RegistryError>,
    {
        if let ZeroSuppressInfo::Call(outer) = &self.info {
            return Err(RegistryError::NestedZeroSuppress {
                route: self.route.clone(),
                outer: outer.kind,
                inner: kind,
            });
        }
        let inner = ZeroSuppressInfo::Call(ZzpCall {
            kind,
            container: self.route.clone(),
            base: self.flat,
            index,
            entry,
            dense_levels: 0,
        });
        let outer = std::mem::replace(&mut self.info, inner);
        let result = self.descend(step, flat_offset, f);
        self.info = outer;
        result
    }

    /// Register the leaf at the current position
    pub fn register_leaf(&mut self) -> Result<(), RegistryError> {
        let descriptor = ZeroSuppressDescriptor {
            info: self.info.clone(),
            route: self.route.clone().into_boxed_slice(),
        };
        self.registry
            .insert(LeafAddr::new(self.level, self.flat), descriptor)
    }
}

/// Destination entries handed out during one event for containers that append.
///
/// A source entry that is cut or not mapped leaves no hole: the next surviving entry
/// of the same slot takes the next free destination entry. Members of one source entry
/// all land in the same destination entry.
#[derive(Debug, Default)]
pub struct AppendedEntries {
    assigned: FxHashMap<(usize, usize, usize), usize>,
    used: FxHashMap<(usize, usize), usize>,
    route: Vec<usize>,
}

impl AppendedEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.assigned.clear();
        self.used.clear();
    }

    /// The route that writes the leaf described by `desc`
    pub fn route<'a>(&'a mut self, desc: &'a ZeroSuppressDescriptor) -> &'a [usize] {
        let ZeroSuppressInfo::Call(call) = &desc.info else {
            return &desc.route;
        };
        let pos = call.container.len();
        if !call.kind.appends() || pos >= desc.route.len() {
            return &desc.route;
        }
        let used = &mut self.used;
        let entry = *self
            .assigned
            .entry((call.base, call.index, call.entry))
            .or_insert_with(|| {
                let next = used.entry((call.base, call.index)).or_insert(0);
                *next += 1;
                *next - 1
            });
        self.route.clear();
        self.route.extend_from_slice(&desc.route);
        self.route[pos] = desc.route[pos] - call.entry + entry;
        &self.route
    }
}
