//! Splitting of multi-event module readouts.
//!
//! Some modules buffer several triggers worth of data and are read out once per
//! buffer. Each chunk they emit carries a hardware event counter; the functions here
//! assign chunks to the logical events of the buffer from that counter.
use bitvec::prelude::*;

use super::error::MultiChunkError;
use super::members::Members;

/// A chunk emitted by a multi-event module
pub trait MultiEventItem: Members + Default {
    /// Number of counts this chunk's event counter is past `counter_start`,
    /// with the module's counter width applied
    fn event_counter_offset(&self, counter_start: u32) -> u32;

    /// The raw hardware event counter of the chunk
    fn event_counter(&self) -> u32;
}

/// Triggers of a buffer for which a gated module's counter advanced.
///
/// A module that only counts a subset of the triggers reports counter offsets in
/// that subset; offset k belongs to the k-th set trigger.
#[derive(Debug, Clone, Default)]
pub struct ExternalToggleMap {
    triggers: BitVec,
}

impl ExternalToggleMap {
    pub fn new(events: usize) -> Self {
        Self {
            triggers: bitvec![0; events],
        }
    }

    pub fn from_triggers(triggers: BitVec) -> Self {
        Self { triggers }
    }

    pub fn set_toggled(&mut self, event: usize, toggled: bool) {
        if event >= self.triggers.len() {
            self.triggers.resize(event + 1, false);
        }
        self.triggers.set(event, toggled);
    }

    /// The event of the `offset`-th counted trigger
    pub fn event_for_offset(&self, offset: usize) -> Option<usize> {
        self.triggers.iter_ones().nth(offset)
    }

    pub fn toggled_count(&self) -> usize {
        self.triggers.count_ones()
    }
}

/// Chunks collected from one module readout, and their assignment to events.
///
/// Item storage is reused between buffers; `clean` only resets the counts.
#[derive(Debug, Clone, Default)]
pub struct MultiChunks<T> {
    items: Vec<T>,
    num_items: usize,
    item_event: Vec<i32>,
    event_index: Vec<i32>,
    null_item: T,
}

impl<T: MultiEventItem> MultiChunks<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clean(&mut self) {
        self.num_items = 0;
        self.item_event.clear();
        self.event_index.clear();
    }

    /// Start a new chunk
    pub fn append_item(&mut self) -> &mut T {
        let pos = self.num_items;
        if pos == self.items.len() {
            self.items.push(T::default());
        } else {
            self.items[pos].clean();
        }
        self.item_event.push(-1);
        self.num_items = pos + 1;
        &mut self.items[pos]
    }

    pub fn items(&self) -> &[T] {
        &self.items[..self.num_items]
    }

    pub fn len(&self) -> usize {
        self.num_items
    }

    pub fn is_empty(&self) -> bool {
        self.num_items == 0
    }

    /// Number of events of the last assignment
    pub fn events(&self) -> usize {
        self.event_index.len()
    }

    /// Per event item index, -1 where no chunk was assigned
    pub fn event_index(&self) -> &[i32] {
        &self.event_index
    }

    pub fn set_item_event(&mut self, item: usize, event: i32) -> Result<(), MultiChunkError> {
        let items = self.num_items;
        let slot = self
            .item_event
            .get_mut(item)
            .ok_or(MultiChunkError::NoSuchItem { item, items })?;
        *slot = event;
        Ok(())
    }

    /// Build the event to item index from the per item event numbers.
    ///
    /// Each event may be claimed by at most one item.
    pub fn assign_events(&mut self, events: usize) -> Result<(), MultiChunkError> {
        self.event_index.clear();
        self.event_index.resize(events, -1);
        for (item, &event) in self.item_event.iter().enumerate() {
            if event < 0 || event as usize >= events {
                return Err(MultiChunkError::EventOutOfRange {
                    item,
                    event: event as i64,
                    events,
                });
            }
            let slot = &mut self.event_index[event as usize];
            if *slot != -1 {
                return Err(MultiChunkError::EventClaimed {
                    event: event as usize,
                    item,
                    previous: *slot as usize,
                });
            }
            *slot = item as i32;
        }
        Ok(())
    }

    /// Assign chunks to events from their event counter offsets.
    ///
    /// With a toggle map the offsets count only the triggers where the module's
    /// counter advanced.
    pub fn map_multi_events(
        &mut self,
        counter_start: u32,
        events: usize,
        toggle_map: Option<&ExternalToggleMap>,
    ) -> Result<(), MultiChunkError> {
        for item in 0..self.num_items {
            let offset = self.items[item].event_counter_offset(counter_start);
            let event = match toggle_map {
                Some(map) => map
                    .event_for_offset(offset as usize)
                    .ok_or(MultiChunkError::ToggleUnmapped { item, offset })?,
                None => offset as usize,
            };
            self.item_event[item] = i32::try_from(event).unwrap_or(i32::MAX);
        }
        self.assign_events(events)?;
        spdlog::trace!(
            "Assigned {} chunks to {} events (counter start {:#x})",
            self.num_items,
            events,
            counter_start
        );
        Ok(())
    }

    /// Assign chunks of a module trusted to emit exactly one chunk per event, in order.
    ///
    /// Chunk k must carry the counter `counter_start + k` (under `counter_mask`).
    pub fn map_continuous_multi_events(
        &mut self,
        counter_start: u32,
        events: usize,
        counter_mask: u32,
    ) -> Result<(), MultiChunkError> {
        if self.num_items > events {
            return Err(MultiChunkError::TooManyItems {
                items: self.num_items,
                events,
            });
        }
        for item in 0..self.num_items {
            let expected = counter_start.wrapping_add(item as u32) & counter_mask;
            let found = self.items[item].event_counter() & counter_mask;
            if found != expected {
                return Err(MultiChunkError::CounterMismatch {
                    item,
                    expected,
                    found,
                });
            }
            self.item_event[item] = item as i32;
        }
        self.assign_events(events)
    }

    /// The chunk of `event`, or the shared empty chunk if the module had none
    pub fn get_item(&self, event: usize) -> &T {
        match self.event_index.get(event) {
            Some(&item) if item >= 0 => &self.items[item as usize],
            _ => &self.null_item,
        }
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Chunk {
        counter: u32,
        value: u16,
    }

    crate::impl_members!(Chunk {
        counter: "counter",
        value: "value",
    });

    impl MultiEventItem for Chunk {
        fn event_counter_offset(&self, counter_start: u32) -> u32 {
            self.counter.wrapping_sub(counter_start) & 0xff
        }

        fn event_counter(&self) -> u32 {
            self.counter
        }
    }

    fn chunks_with_events(events: &[i32]) -> MultiChunks<Chunk> {
        let mut chunks = MultiChunks::<Chunk>::new();
        for (item, &event) in events.iter().enumerate() {
            chunks.append_item().value = item as u16;
            chunks.set_item_event(item, event).unwrap();
        }
        chunks
    }

    #[test]
    fn test_assign_events() {
        let mut chunks = chunks_with_events(&[2, 0, 5]);
        chunks.assign_events(6).unwrap();
        // Item 0 claims event 2, item 1 event 0, item 2 event 5
        assert_eq!(chunks.event_index(), &[1, -1, 0, -1, -1, 2]);
        assert_eq!(chunks.get_item(2).value, 0);
        assert_eq!(chunks.get_item(5).value, 2);
        assert_eq!(*chunks.get_item(3), Chunk::default());
    }

    #[test]
    fn test_assign_collision_fails() {
        let mut chunks = chunks_with_events(&[2, 0, 5]);
        chunks.assign_events(6).unwrap();
        chunks.set_item_event(2, 2).unwrap();
        assert!(matches!(
            chunks.assign_events(6),
            Err(MultiChunkError::EventClaimed {
                event: 2,
                item: 2,
                previous: 0
            })
        ));
    }

    #[test]
    fn test_set_event_of_missing_item() {
        let mut chunks = chunks_with_events(&[0]);
        assert!(matches!(
            chunks.set_item_event(3, 1),
            Err(MultiChunkError::NoSuchItem { item: 3, items: 1 })
        ));
    }

    #[test]
    fn test_assign_out_of_range_fails() {
        let mut chunks = chunks_with_events(&[0, 4]);
        assert!(matches!(
            chunks.assign_events(4),
            Err(MultiChunkError::EventOutOfRange { item: 1, event: 4, .. })
        ));
    }

    #[test]
    fn test_map_multi_events_with_wrap() {
        let mut chunks = MultiChunks::<Chunk>::new();
        for counter in [0xfe, 0x01, 0xff] {
            chunks.append_item().counter = counter;
        }
        chunks.map_multi_events(0xfe, 4, None).unwrap();
        assert_eq!(chunks.event_index(), &[0, 2, -1, 1]);
    }

    #[test]
    fn test_map_multi_events_toggle_map() {
        let mut toggle = ExternalToggleMap::new(5);
        toggle.set_toggled(1, true);
        toggle.set_toggled(4, true);
        let mut chunks = MultiChunks::<Chunk>::new();
        chunks.append_item().counter = 10;
        chunks.append_item().counter = 11;
        chunks.map_multi_events(10, 5, Some(&toggle)).unwrap();
        assert_eq!(chunks.event_index(), &[-1, 0, -1, -1, 1]);

        chunks.append_item().counter = 12;
        assert!(matches!(
            chunks.map_multi_events(10, 5, Some(&toggle)),
            Err(MultiChunkError::ToggleUnmapped { item: 2, offset: 2 })
        ));
    }

    #[test]
    fn test_continuous_counter_check() {
        let mut chunks = MultiChunks::<Chunk>::new();
        for counter in [0x0ffe, 0x0fff, 0x1000] {
            chunks.append_item().counter = counter;
        }
        chunks.map_continuous_multi_events(0xffe, 3, 0xfff).unwrap();
        assert_eq!(chunks.event_index(), &[0, 1, 2]);

        chunks.clean();
        chunks.append_item().counter = 7;
        chunks.append_item().counter = 9;
        assert!(matches!(
            chunks.map_continuous_multi_events(7, 2, 0xff),
            Err(MultiChunkError::CounterMismatch {
                item: 1,
                expected: 8,
                found: 9
            })
        ));
    }

    #[test]
    fn test_clean_reuses_items() {
        let mut chunks = MultiChunks::<Chunk>::new();
        chunks.append_item().value = 3;
        chunks.clean();
        assert!(chunks.is_empty());
        assert_eq!(chunks.append_item().value, 0);
        assert_eq!(chunks.len(), 1);
    }
}
