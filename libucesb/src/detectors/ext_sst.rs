use super::{field, marker, pack, WordCursor};
use crate::error::UnpackError;
use crate::list_zero_suppress::RawListZeroSuppress;
use crate::zero_suppress::RawArrayZeroSuppress;

pub const SST_CHANNELS: usize = 1024;
pub const SST_HEADER: u32 = 0x1;
pub const SST_DATA: u32 = 0x2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SstHeader {
    pub module: u32,
    pub count: u32,
}

impl SstHeader {
    pub fn decode(word: u32) -> Self {
        Self {
            module: field(word, 24, 4),
            count: field(word, 0, 16),
        }
    }

    pub fn encode(&self) -> u32 {
        pack(SST_HEADER, 28, 4) | pack(self.module, 24, 4) | pack(self.count, 0, 16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SstData {
    pub channel: u32,
    pub adc: u32,
}

impl SstData {
    pub fn decode(word: u32) -> Option<Self> {
        if marker(word) != SST_DATA {
            return None;
        }
        Some(Self {
            channel: field(word, 12, 10),
            adc: field(word, 0, 12),
        })
    }

    pub fn encode(&self) -> u32 {
        pack(SST_DATA, 28, 4) | pack(self.channel, 12, 10) | pack(self.adc, 0, 12)
    }
}

/// Silicon strip module, unpack level. Strips report in arbitrary order.
#[derive(Debug, Clone, Default)]
pub struct ExtSst {
    pub data: RawArrayZeroSuppress<u16, SST_CHANNELS>,
}

crate::impl_members!(ExtSst { data: "data" });

impl ExtSst {
    /// Read the data words announced by `header`
    pub fn unpack(&mut self, header: &SstHeader, cursor: &mut WordCursor<'_>) -> Result<(), UnpackError> {
        for _ in 0..header.count {
            let word = cursor.next_word()?;
            let data = SstData::decode(word)
                .ok_or_else(|| cursor.bad_word(word, "expected SST data word"))?;
            *self.data.insert_index(data.channel as usize)? = data.adc as u16;
        }
        Ok(())
    }
}

/// Silicon strip module, raw level
#[derive(Debug, Clone, Default)]
pub struct SstRaw {
    pub data: RawListZeroSuppress<u16, SST_CHANNELS>,
}

crate::impl_members!(SstRaw { data: "data" });

/// Silicon strip module, calibrated energies
#[derive(Debug, Clone, Default)]
pub struct SstCal {
    pub e: RawArrayZeroSuppress<f32, SST_CHANNELS>,
}

crate::impl_members!(SstCal { e: "E" @ "keV" });
