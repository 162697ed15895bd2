use super::{field, marker, pack, WordCursor};
use crate::error::{UnpackError, ZeroSuppressError};
use crate::members::Members;
use crate::multi_chunks::MultiEventItem;
use crate::multi_zero_suppress::RawArrayMultiZeroSuppress;

pub const TDC_CHANNELS: usize = 32;
/// Hits a channel can record per trigger
pub const TDC_HITS: usize = 8;
pub const TDC_HEADER: u32 = 0x4;
pub const TDC_HIT: u32 = 0x5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TdcHeader {
    pub counter: u32,
    pub nhits: u32,
}

impl TdcHeader {
    pub fn decode(word: u32) -> Self {
        Self {
            counter: field(word, 16, 8),
            nhits: field(word, 0, 8),
        }
    }

    pub fn encode(&self) -> u32 {
        pack(TDC_HEADER, 28, 4) | pack(self.counter, 16, 8) | pack(self.nhits, 0, 8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TdcHit {
    pub channel: u32,
    pub time: u32,
}

impl TdcHit {
    pub fn decode(word: u32) -> Option<Self> {
        if marker(word) != TDC_HIT {
            return None;
        }
        Some(Self {
            channel: field(word, 16, 5),
            time: field(word, 0, 16),
        })
    }

    pub fn encode(&self) -> u32 {
        pack(TDC_HIT, 28, 4) | pack(self.channel, 16, 5) | pack(self.time, 0, 16)
    }
}

/// The data of one trigger from the multi-event TDC
#[derive(Debug, Clone, Default)]
pub struct TdcChunk {
    pub counter: u32,
    pub hits: RawArrayMultiZeroSuppress<u16, TDC_CHANNELS, TDC_HITS>,
}

crate::impl_members!(TdcChunk {
    counter: "counter",
    hits: "hits",
});

impl TdcChunk {
    pub fn unpack(&mut self, header: &TdcHeader, cursor: &mut WordCursor<'_>) -> Result<(), UnpackError> {
        self.counter = header.counter;
        for _ in 0..header.nhits {
            let word = cursor.next_word()?;
            let hit = TdcHit::decode(word)
                .ok_or_else(|| cursor.bad_word(word, "expected TDC hit word"))?;
            *self.hits.insert_index(hit.channel as usize)? = hit.time as u16;
        }
        Ok(())
    }

    /// Replace the contents with those of `other`, reusing storage
    pub fn copy_from(&mut self, other: &TdcChunk) -> Result<(), ZeroSuppressError> {
        self.clean();
        self.counter = other.counter;
        for (channel, times) in other.hits.iter() {
            for &time in times {
                *self.hits.on_insert_index(channel)? = time;
            }
        }
        Ok(())
    }
}

impl MultiEventItem for TdcChunk {
    fn event_counter_offset(&self, counter_start: u32) -> u32 {
        self.counter.wrapping_sub(counter_start) & 0xff
    }

    fn event_counter(&self) -> u32 {
        self.counter
    }
}

/// TDC, raw level
#[derive(Debug, Clone, Default)]
pub struct TdcRaw {
    pub hits: RawArrayMultiZeroSuppress<u16, TDC_CHANNELS, TDC_HITS>,
}

crate::impl_members!(TdcRaw { hits: "hits" });

/// TDC, calibrated times
#[derive(Debug, Clone, Default)]
pub struct TdcCal {
    pub t: RawArrayMultiZeroSuppress<f32, TDC_CHANNELS, TDC_HITS>,
}

crate::impl_members!(TdcCal { t: "T" @ "ns" });

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_words() {
        let header = TdcHeader::decode(0x40ab_0003);
        assert_eq!(header, TdcHeader { counter: 0xab, nhits: 3 });
        assert_eq!(header.encode(), 0x40ab_0003);
        let hit = TdcHit::decode(0x5011_2345).unwrap();
        assert_eq!(hit, TdcHit { channel: 17, time: 0x2345 });
        assert!(TdcHit::decode(0x4011_2345).is_none());
    }

    #[test]
    fn test_unpack_multi_hit() {
        let words = [
            TdcHit { channel: 2, time: 5 }.encode(),
            TdcHit { channel: 2, time: 6 }.encode(),
            TdcHit { channel: 30, time: 7 }.encode(),
        ];
        let mut cursor = WordCursor::new(&words);
        let mut chunk = TdcChunk::default();
        chunk
            .unpack(&TdcHeader { counter: 9, nhits: 3 }, &mut cursor)
            .unwrap();
        assert_eq!(chunk.counter, 9);
        assert_eq!(chunk.hits.entries(2), &[5, 6]);
        assert_eq!(chunk.event_counter_offset(7), 2);

        let mut copy = TdcChunk::default();
        *copy.hits.insert_index(1).unwrap() = 1;
        copy.copy_from(&chunk).unwrap();
        assert_eq!(copy.hits.count(1), 0);
        assert_eq!(copy.hits.entries(30), &[7]);
        assert_eq!(copy.counter, 9);
    }

    #[test]
    fn test_too_many_hits() {
        let words: Vec<u32> = (0..9).map(|t| TdcHit { channel: 0, time: t }.encode()).collect();
        let mut cursor = WordCursor::new(&words);
        let mut chunk = TdcChunk::default();
        assert!(matches!(
            chunk.unpack(&TdcHeader { counter: 0, nhits: 9 }, &mut cursor),
            Err(UnpackError::ZeroSuppress(ZeroSuppressError::TooManyEntries { .. }))
        ));
    }
}
