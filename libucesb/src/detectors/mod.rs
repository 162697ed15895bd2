//! A demonstration experiment layout.
//!
//! Two silicon strip modules (`SST[0]`, `SST[1]`) read out once per buffer and a TDC
//! that buffers several triggers and tags each chunk with an 8-bit event counter.
//! The three mirror levels are declared with [`impl_members!`](crate::impl_members).
//!
//! Hardware words carry a 4-bit marker in bits 28..32:
//!
//! | marker | word |
//! |---|---|
//! | 0x1 | SST header: module (24..28), data word count (0..16) |
//! | 0x2 | SST data: channel (12..22), adc (0..12) |
//! | 0x4 | TDC header: event counter (16..24), hit count (0..8) |
//! | 0x5 | TDC hit: channel (16..21), time (0..16) |
pub mod ext_sst;
pub mod vme_tdc;

use serde::{Deserialize, Serialize};

use self::ext_sst::{ExtSst, SstCal, SstData, SstHeader, SstRaw, SST_CHANNELS, SST_HEADER};
use self::vme_tdc::{TdcCal, TdcChunk, TdcHeader, TdcHit, TdcRaw, TDC_HEADER};
use super::error::UnpackError;
use super::event_file::EventRecord;
use super::members::Members;
use super::multi_chunks::MultiChunks;
use super::raw_array::RawArray;
use super::session::EventLayout;

pub const SST_MODULES: usize = 2;

/// Extract `bits` bits of `word` starting at bit `shift`
pub const fn field(word: u32, shift: u32, bits: u32) -> u32 {
    (word >> shift) & ((1u32 << bits) - 1)
}

/// Place `value` into `bits` bits starting at bit `shift`
pub const fn pack(value: u32, shift: u32, bits: u32) -> u32 {
    (value & ((1u32 << bits) - 1)) << shift
}

pub const fn marker(word: u32) -> u32 {
    word >> 28
}

/// Sequential access to the words of a record
#[derive(Debug)]
pub struct WordCursor<'a> {
    words: &'a [u32],
    pos: usize,
}

impl<'a> WordCursor<'a> {
    pub fn new(words: &'a [u32]) -> Self {
        Self { words, pos: 0 }
    }

    pub fn peek(&self) -> Option<u32> {
        self.words.get(self.pos).copied()
    }

    pub fn next_word(&mut self) -> Result<u32, UnpackError> {
        let word = self
            .words
            .get(self.pos)
            .copied()
            .ok_or(UnpackError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(word)
    }

    /// Position of the last word read
    pub fn pos(&self) -> usize {
        self.pos.saturating_sub(1)
    }

    pub fn bad_word(&self, word: u32, what: &'static str) -> UnpackError {
        UnpackError::BadWord {
            word,
            pos: self.pos(),
            what,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DemoUnpack {
    pub sst: RawArray<ExtSst, SST_MODULES>,
    pub tdc: TdcChunk,
}

crate::impl_members!(DemoUnpack {
    sst: "SST",
    tdc: "TDC",
});

#[derive(Debug, Clone, Default)]
pub struct DemoRaw {
    pub sst: RawArray<SstRaw, SST_MODULES>,
    pub tdc: TdcRaw,
}

crate::impl_members!(DemoRaw {
    sst: "SST",
    tdc: "TDC",
});

#[derive(Debug, Clone, Default)]
pub struct DemoCal {
    pub sst: RawArray<SstCal, SST_MODULES>,
    pub tdc: TdcCal,
}

crate::impl_members!(DemoCal {
    sst: "SST",
    tdc: "TDC",
});

/// How TDC chunks are assigned to the triggers of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiEventMode {
    /// By event counter offset; triggers without a chunk get an empty TDC
    #[default]
    Offset,
    /// One chunk per trigger in order, with checked counters
    Continuous,
}

/// Counter width of the TDC event counter
const TDC_COUNTER_MASK: u32 = 0xff;

/// Triggers one buffer may hold; the TDC counter cannot tell more apart
pub const MAX_RECORD_TRIGGERS: u32 = TDC_COUNTER_MASK + 1;

/// Unpacker of the demonstration layout
#[derive(Debug, Default)]
pub struct DemoLayout {
    mode: MultiEventMode,
    tdc_chunks: MultiChunks<TdcChunk>,
}

impl DemoLayout {
    pub fn new(mode: MultiEventMode) -> Self {
        Self {
            mode,
            tdc_chunks: MultiChunks::new(),
        }
    }

    pub fn tdc_chunks(&self) -> &MultiChunks<TdcChunk> {
        &self.tdc_chunks
    }
}

impl EventLayout for DemoLayout {
    type Unpack = DemoUnpack;
    type Raw = DemoRaw;
    type Cal = DemoCal;

    fn name(&self) -> &'static str {
        "demo"
    }

    fn unpack(&mut self, record: &EventRecord, unpack: &mut DemoUnpack) -> Result<usize, UnpackError> {
        if record.triggers > MAX_RECORD_TRIGGERS {
            return Err(UnpackError::TooManyTriggers {
                triggers: record.triggers,
                limit: MAX_RECORD_TRIGGERS,
            });
        }
        self.tdc_chunks.clean();
        let mut cursor = WordCursor::new(&record.words);
        while let Some(word) = cursor.peek() {
            match marker(word) {
                SST_HEADER => {
                    cursor.next_word()?;
                    let header = SstHeader::decode(word);
                    let module = unpack
                        .sst
                        .get_mut(header.module as usize)
                        .ok_or_else(|| cursor.bad_word(word, "SST module out of range"))?;
                    module.unpack(&header, &mut cursor)?;
                }
                TDC_HEADER => {
                    cursor.next_word()?;
                    let header = TdcHeader::decode(word);
                    let chunk = self.tdc_chunks.append_item();
                    chunk.unpack(&header, &mut cursor)?;
                }
                _ => {
                    cursor.next_word()?;
                    return Err(cursor.bad_word(word, "unknown module marker"));
                }
            }
        }

        let events = record.triggers.max(1) as usize;
        match self.mode {
            MultiEventMode::Offset => {
                self.tdc_chunks
                    .map_multi_events(record.event_number, events, None)?
            }
            MultiEventMode::Continuous => self.tdc_chunks.map_continuous_multi_events(
                record.event_number,
                events,
                TDC_COUNTER_MASK,
            )?,
        }
        Ok(events)
    }

    fn select_event(&mut self, event: usize, unpack: &mut DemoUnpack) -> Result<(), UnpackError> {
        // The strip modules are read once per buffer and belong to its first trigger
        if event > 0 {
            unpack.sst.clean();
        }
        unpack.tdc.copy_from(self.tdc_chunks.get_item(event))?;
        Ok(())
    }
}

/// Generate a deterministic stream of readout buffers for the demonstration layout.
///
/// Each buffer holds both strip modules and one TDC chunk for most of its triggers.
pub fn synthesize(first_event: u32, records: usize, triggers: u32) -> Vec<EventRecord> {
    let triggers = triggers.clamp(1, MAX_RECORD_TRIGGERS);
    (0..records)
        .map(|r| {
            let event_number = first_event.wrapping_add(r as u32 * triggers);
            let mut words = Vec::new();
            for module in 0..SST_MODULES {
                let hits = (r + module) % 5 + 1;
                words.push(
                    SstHeader {
                        module: module as u32,
                        count: hits as u32,
                    }
                    .encode(),
                );
                for k in 0..hits {
                    let channel = (r * 37 + k * 101 + module * 13) % SST_CHANNELS;
                    words.push(
                        SstData {
                            channel: channel as u32,
                            adc: ((r * 7 + k * 3 + 50) % 4096) as u32,
                        }
                        .encode(),
                    );
                }
            }
            for t in 0..triggers {
                if (r as u32 + t) % 3 == 2 {
                    continue;
                }
                let nhits = t % 3 + 1;
                words.push(
                    TdcHeader {
                        counter: event_number.wrapping_add(t) & TDC_COUNTER_MASK,
                        nhits,
                    }
                    .encode(),
                );
                for h in 0..nhits {
                    words.push(
                        TdcHit {
                            channel: (r as u32 + t + h) % 32,
                            time: 1000 + r as u32 + 17 * h,
                        }
                        .encode(),
                    );
                }
            }
            EventRecord {
                event_number,
                triggers,
                words,
            }
        })
        .collect()
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MultiChunkError;

    #[test]
    fn test_field_helpers() {
        let word = pack(0x5, 28, 4) | pack(17, 16, 5) | pack(0xbeef, 0, 16);
        assert_eq!(marker(word), 0x5);
        assert_eq!(field(word, 16, 5), 17);
        assert_eq!(field(word, 0, 16), 0xbeef);
    }

    #[test]
    fn test_unpack_buffer() {
        let record = EventRecord {
            event_number: 0x1fe,
            triggers: 3,
            words: vec![
                SstHeader { module: 1, count: 2 }.encode(),
                SstData { channel: 517, adc: 300 }.encode(),
                SstData { channel: 4, adc: 12 }.encode(),
                TdcHeader { counter: 0x00, nhits: 1 }.encode(),
                TdcHit { channel: 3, time: 99 }.encode(),
                TdcHeader { counter: 0xfe, nhits: 2 }.encode(),
                TdcHit { channel: 3, time: 10 }.encode(),
                TdcHit { channel: 3, time: 11 }.encode(),
            ],
        };
        let mut layout = DemoLayout::new(MultiEventMode::Offset);
        let mut unpack = DemoUnpack::default();
        assert_eq!(layout.unpack(&record, &mut unpack).unwrap(), 3);
        assert_eq!(layout.tdc_chunks().event_index(), &[1, -1, 0]);
        let valid: Vec<usize> = unpack.sst[1].data.iter().map(|(ch, _)| ch).collect();
        assert_eq!(valid, vec![4, 517]);

        layout.select_event(0, &mut unpack).unwrap();
        assert_eq!(unpack.tdc.hits.entries(3), &[10, 11]);
        layout.select_event(1, &mut unpack).unwrap();
        assert!(unpack.tdc.hits.valid().is_empty());
        assert!(unpack.sst[1].data.is_empty());
        layout.select_event(2, &mut unpack).unwrap();
        assert_eq!(unpack.tdc.hits.entries(3), &[99]);
    }

    #[test]
    fn test_bad_words() {
        let mut layout = DemoLayout::default();
        let mut unpack = DemoUnpack::default();
        let record = EventRecord {
            event_number: 0,
            triggers: 1,
            words: vec![SstHeader { module: 2, count: 0 }.encode()],
        };
        assert!(matches!(
            layout.unpack(&record, &mut unpack),
            Err(UnpackError::BadWord { pos: 0, .. })
        ));
        let record = EventRecord {
            event_number: 0,
            triggers: 1,
            words: vec![SstHeader { module: 0, count: 2 }.encode(), 0x2000_0001],
        };
        assert!(matches!(
            layout.unpack(&record, &mut unpack),
            Err(UnpackError::Truncated(2))
        ));
        let record = EventRecord {
            event_number: 0,
            triggers: 1,
            words: vec![0x7000_0000],
        };
        assert!(matches!(
            layout.unpack(&record, &mut unpack),
            Err(UnpackError::BadWord { word: 0x7000_0000, .. })
        ));
    }

    #[test]
    fn test_trigger_count_limit() {
        let mut layout = DemoLayout::default();
        let mut unpack = DemoUnpack::default();
        let record = EventRecord {
            event_number: 0,
            triggers: u32::MAX,
            words: vec![],
        };
        assert!(matches!(
            layout.unpack(&record, &mut unpack),
            Err(UnpackError::TooManyTriggers {
                triggers: u32::MAX,
                limit: MAX_RECORD_TRIGGERS
            })
        ));
        assert!(layout.tdc_chunks().event_index().is_empty());

        let record = EventRecord {
            event_number: 0,
            triggers: MAX_RECORD_TRIGGERS,
            words: vec![],
        };
        assert_eq!(
            layout.unpack(&record, &mut unpack).unwrap(),
            MAX_RECORD_TRIGGERS as usize
        );
    }

    #[test]
    fn test_continuous_mode_checks_counters() {
        let mut layout = DemoLayout::new(MultiEventMode::Continuous);
        let mut unpack = DemoUnpack::default();
        let record = EventRecord {
            event_number: 10,
            triggers: 2,
            words: vec![
                TdcHeader { counter: 10, nhits: 0 }.encode(),
                TdcHeader { counter: 12, nhits: 0 }.encode(),
            ],
        };
        assert!(matches!(
            layout.unpack(&record, &mut unpack),
            Err(UnpackError::MultiChunk(MultiChunkError::CounterMismatch { item: 1, .. }))
        ));
    }

    #[test]
    fn test_synthesized_records_unpack() {
        let mut layout = DemoLayout::default();
        let mut unpack = DemoUnpack::default();
        for record in synthesize(250, 20, 4) {
            unpack.clean();
            let events = layout.unpack(&record, &mut unpack).unwrap();
            assert_eq!(events, 4);
            assert!(layout.tdc_chunks().len() <= 4);
        }
    }
}
