use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use super::error::EventFileError;

/// Largest record payload accepted, in 32-bit words
const MAX_RECORD_WORDS: u32 = 1 << 20;
/// Size of the record header in bytes
const RECORD_HEADER_SIZE: u64 = 12;

/// Byte order of the words of an event file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordOrder {
    #[default]
    Big,
    Little,
}

/// One readout buffer: the words of all modules for one or more triggers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRecord {
    /// Trigger number of the first trigger in the buffer
    pub event_number: u32,
    /// Number of triggers collected in the buffer
    pub triggers: u32,
    pub words: Vec<u32>,
}

impl EventRecord {
    /// Size of the record on disk in bytes
    pub fn size_bytes(&self) -> u64 {
        RECORD_HEADER_SIZE + 4 * self.words.len() as u64
    }
}

/// Reads event records, `[event_number][triggers][n_words][words...]`, all 32-bit
#[derive(Debug)]
pub struct EventFileReader<R: Read> {
    reader: R,
    order: WordOrder,
    records_read: u64,
    bytes_read: u64,
}

impl EventFileReader<BufReader<File>> {
    pub fn open(path: &Path, order: WordOrder) -> Result<Self, EventFileError> {
        if !path.exists() {
            return Err(EventFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file), order))
    }
}

impl<R: Read> EventFileReader<R> {
    pub fn from_reader(reader: R, order: WordOrder) -> Self {
        Self {
            reader,
            order,
            records_read: 0,
            bytes_read: 0,
        }
    }

    fn read_u32(&mut self) -> std::io::Result<u32> {
        match self.order {
            WordOrder::Big => self.reader.read_u32::<BigEndian>(),
            WordOrder::Little => self.reader.read_u32::<LittleEndian>(),
        }
    }

    /// Read the next record into `record`, reusing its word buffer.
    ///
    /// Returns `EndOfFile` when the stream ends cleanly between records.
    pub fn read_record_into(&mut self, record: &mut EventRecord) -> Result<(), EventFileError> {
        record.event_number = match self.read_u32() {
            Ok(word) => word,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(EventFileError::EndOfFile),
            Err(e) => return Err(e.into()),
        };
        record.triggers = self.read_u32()?;
        let n_words = self.read_u32()?;
        if n_words > MAX_RECORD_WORDS {
            return Err(EventFileError::OversizedRecord {
                record: self.records_read,
                words: n_words,
                limit: MAX_RECORD_WORDS,
            });
        }
        record.words.resize(n_words as usize, 0);
        match self.order {
            WordOrder::Big => self.reader.read_u32_into::<BigEndian>(&mut record.words)?,
            WordOrder::Little => self.reader.read_u32_into::<LittleEndian>(&mut record.words)?,
        }
        self.records_read += 1;
        self.bytes_read += record.size_bytes();
        Ok(())
    }

    pub fn read_record(&mut self) -> Result<EventRecord, EventFileError> {
        let mut record = EventRecord::default();
        self.read_record_into(&mut record)?;
        Ok(record)
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

/// Writes event records in the format read by [`EventFileReader`]
#[derive(Debug)]
pub struct EventFileWriter<W: Write> {
    writer: W,
    order: WordOrder,
    records_written: u64,
}

impl EventFileWriter<BufWriter<File>> {
    pub fn create(path: &Path, order: WordOrder) -> Result<Self, EventFileError> {
        let file = File::create(path)?;
        Ok(Self::from_writer(BufWriter::new(file), order))
    }
}

impl<W: Write> EventFileWriter<W> {
    pub fn from_writer(writer: W, order: WordOrder) -> Self {
        Self {
            writer,
            order,
            records_written: 0,
        }
    }

    fn write_u32(&mut self, word: u32) -> std::io::Result<()> {
        match self.order {
            WordOrder::Big => self.writer.write_u32::<BigEndian>(word),
            WordOrder::Little => self.writer.write_u32::<LittleEndian>(word),
        }
    }

    pub fn write_record(&mut self, record: &EventRecord) -> Result<(), EventFileError> {
        self.write_u32(record.event_number)?;
        self.write_u32(record.triggers)?;
        self.write_u32(record.words.len() as u32)?;
        for &word in &record.words {
            self.write_u32(word)?;
        }
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn finish(mut self) -> Result<W, EventFileError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn records() -> Vec<EventRecord> {
        vec![
            EventRecord {
                event_number: 1,
                triggers: 1,
                words: vec![0x1000_0002, 0x2000_5123],
            },
            EventRecord {
                event_number: 2,
                triggers: 4,
                words: vec![],
            },
        ]
    }

    #[test]
    fn test_records_through_buffer() {
        for order in [WordOrder::Big, WordOrder::Little] {
            let mut writer = EventFileWriter::from_writer(Vec::new(), order);
            for record in records() {
                writer.write_record(&record).unwrap();
            }
            let bytes = writer.finish().unwrap();
            assert_eq!(bytes.len(), 12 + 8 + 12);

            let mut reader = EventFileReader::from_reader(Cursor::new(bytes), order);
            assert_eq!(reader.read_record().unwrap(), records()[0]);
            assert_eq!(reader.read_record().unwrap(), records()[1]);
            assert!(matches!(reader.read_record(), Err(EventFileError::EndOfFile)));
            assert_eq!(reader.records_read(), 2);
            assert_eq!(reader.bytes_read(), 32);
        }
    }

    #[test]
    fn test_byte_order_on_disk() {
        let mut writer = EventFileWriter::from_writer(Vec::new(), WordOrder::Big);
        writer
            .write_record(&EventRecord {
                event_number: 0x0102_0304,
                triggers: 0,
                words: vec![],
            })
            .unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(&bytes[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_truncated_and_oversized() {
        let bytes: Vec<u8> = vec![0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 7];
        let mut reader = EventFileReader::from_reader(Cursor::new(bytes), WordOrder::Big);
        assert!(matches!(reader.read_record(), Err(EventFileError::IOError(_))));

        let bytes: Vec<u8> = vec![0, 0, 0, 1, 0, 0, 0, 1, 0xff, 0xff, 0xff, 0xff];
        let mut reader = EventFileReader::from_reader(Cursor::new(bytes), WordOrder::Big);
        assert!(matches!(
            reader.read_record(),
            Err(EventFileError::OversizedRecord { record: 0, .. })
        ));
    }
}
