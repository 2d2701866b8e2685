//! Record codec
//!
//! Framing and parsing of a single Set/Delete operation.

use std::io::{ErrorKind, Read, Write};

use bytes::Bytes;

use crate::error::{KvError, Result};

/// Magic bytes opening every record
pub const MAGIC: [u8; 2] = [0xF0, 0xF1];

/// Header size: Magic (2) + OpCode (1) + KeyLen (4) + ValueLen (4) = 11 bytes
pub const HEADER_SIZE: usize = 11;

/// Trailer size: CRC32 (4)
pub const CHECKSUM_SIZE: usize = 4;

/// Operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Set = 0x01,
    Delete = 0x02,
}

impl TryFrom<u8> for OpCode {
    type Error = KvError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(OpCode::Set),
            0x02 => Ok(OpCode::Delete),
            other => Err(KvError::InvalidOpcode(other)),
        }
    }
}

/// A single logged operation
///
/// `opcode` is kept raw: decoding never rejects an unknown opcode, callers
/// do that through [`Record::op`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub opcode: u8,
    pub key: String,
    /// Empty for `Delete`
    pub value: Bytes,
}

impl Record {
    pub fn set(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            opcode: OpCode::Set as u8,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            opcode: OpCode::Delete as u8,
            key: key.into(),
            value: Bytes::new(),
        }
    }

    /// Decode the opcode, failing with `InvalidOpcode` for unknown bytes
    pub fn op(&self) -> Result<OpCode> {
        OpCode::try_from(self.opcode)
    }

    /// Value bytes that actually go on disk (only `Set` carries a value)
    fn payload(&self) -> &[u8] {
        if self.opcode == OpCode::Set as u8 {
            &self.value
        } else {
            &[]
        }
    }

    /// Size of the framed record in bytes
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.key.len() + self.payload().len() + CHECKSUM_SIZE
    }

    /// Write the framed record, returning the number of bytes written
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let key = self.key.as_bytes();
        let value = self.payload();

        let key_len = length_field("key", key.len())?;
        let value_len = length_field("value", value.len())?;

        let key_len_bytes = key_len.to_le_bytes();
        let value_len_bytes = value_len.to_le_bytes();
        let crc = checksum(self.opcode, &key_len_bytes, &value_len_bytes, key, value);

        writer.write_all(&MAGIC)?;
        writer.write_all(&[self.opcode])?;
        writer.write_all(&key_len_bytes)?;
        writer.write_all(&value_len_bytes)?;
        writer.write_all(key)?;
        writer.write_all(value)?;
        writer.write_all(&crc.to_le_bytes())?;

        Ok(self.encoded_len() as u64)
    }
}

/// Encode a record to its framed byte form
pub fn encode(record: &Record) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(record.encoded_len());
    record.write_to(&mut buf)?;
    Ok(buf)
}

/// Decode the next record from a reader
///
/// Returns:
/// - `Ok(Some(record))`: a complete, checksum-verified record
/// - `Ok(None)`: the stream ended cleanly before a new record began
/// - `Err(InvalidMagic)` / `Err(ChecksumMismatch)`: corrupt record
/// - `Err(Io(UnexpectedEof))`: the stream ended mid-record
pub fn decode<R: Read>(reader: &mut R) -> Result<Option<Record>> {
    let magic = match read_magic(reader)? {
        Some(magic) => magic,
        None => return Ok(None),
    };
    if magic != MAGIC {
        return Err(KvError::InvalidMagic);
    }

    // Rest of the header: opcode (1) + key_len (4) + value_len (4)
    let mut header = [0u8; HEADER_SIZE - 2];
    reader.read_exact(&mut header)?;

    let opcode = header[0];
    let key_len_bytes: [u8; 4] = [header[1], header[2], header[3], header[4]];
    let value_len_bytes: [u8; 4] = [header[5], header[6], header[7], header[8]];
    let key_len = u32::from_le_bytes(key_len_bytes);
    let value_len = u32::from_le_bytes(value_len_bytes);

    let key = read_bounded(reader, key_len)?;

    let value = if opcode == OpCode::Set as u8 {
        read_bounded(reader, value_len)?
    } else {
        Vec::new()
    };

    let mut crc_bytes = [0u8; CHECKSUM_SIZE];
    reader.read_exact(&mut crc_bytes)?;
    let expected = u32::from_le_bytes(crc_bytes);
    let actual = checksum(opcode, &key_len_bytes, &value_len_bytes, &key, &value);
    if expected != actual {
        return Err(KvError::ChecksumMismatch { expected, actual });
    }

    let key = String::from_utf8(key)
        .map_err(|_| KvError::Corrupted("record key is not valid UTF-8".to_string()))?;

    Ok(Some(Record {
        opcode,
        key,
        value: Bytes::from(value),
    }))
}

/// CRC32 over opcode, both length fields, key and value
fn checksum(opcode: u8, key_len: &[u8; 4], value_len: &[u8; 4], key: &[u8], value: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[opcode]);
    hasher.update(key_len);
    hasher.update(value_len);
    hasher.update(key);
    hasher.update(value);
    hasher.finalize()
}

fn length_field(field: &'static str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| KvError::RecordTooLarge { field, len })
}

/// Read the two magic bytes, distinguishing a clean end of stream (no bytes
/// at all) from a record cut off after its first byte.
fn read_magic<R: Read>(reader: &mut R) -> Result<Option<[u8; 2]>> {
    let mut magic = [0u8; 2];
    let mut filled = 0;
    while filled < magic.len() {
        match reader.read(&mut magic[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(KvError::Io(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "stream ended inside record magic",
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Some(magic))
}

/// Read exactly `len` bytes without trusting `len` for the allocation
fn read_bounded<R: Read>(reader: &mut R, len: u32) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(u64::from(len)).read_to_end(&mut buf)?;
    if buf.len() != len as usize {
        return Err(KvError::Io(std::io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("expected {} bytes, stream ended after {}", len, buf.len()),
        )));
    }
    Ok(buf)
}
