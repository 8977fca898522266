//! Framing codec for snapshot files.
//!
//! A snapshot file is a header followed by a single framed record:
//! - JSON for data (the same serde shape the memory store uses)
//! - Length-prefixed format for framing
//! - CRC32 checksum for corruption detection
//! - Version byte for forward compatibility

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};

use crc32fast::Hasher;
use serde::{de::DeserializeOwned, Serialize};

/// Current codec version.
const CODEC_VERSION: u8 = 1;

/// Magic bytes identifying a livewatch snapshot.
pub const MAGIC: [u8; 4] = *b"LVWL";

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Serializes a value to a framed record.
///
/// Format:
/// ```text
/// [version: 1 byte][length: 4 bytes LE][data: N bytes JSON][crc32: 4 bytes LE]
/// ```
pub fn encode<T: Serialize + ?Sized>(value: &T) -> IoResult<Vec<u8>> {
    let data = serde_json::to_vec(value)
        .map_err(|e| IoError::new(ErrorKind::InvalidData, format!("serialization failed: {e}")))?;

    let len = u32::try_from(data.len()).map_err(|_| {
        IoError::new(
            ErrorKind::InvalidData,
            format!("record of {} bytes does not fit a u32 length prefix", data.len()),
        )
    })?;
    let crc = checksum(&data);

    let mut out = Vec::with_capacity(1 + 4 + data.len() + 4);
    out.push(CODEC_VERSION);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(&crc.to_le_bytes());

    Ok(out)
}

/// Deserializes a framed record, verifying its checksum.
///
/// # Errors
/// - Returns error if the record is larger than `max_len`
/// - Returns error if checksum fails (corruption detected)
/// - Returns error if version is unsupported
/// - Returns error if deserialization fails
pub fn decode<T: DeserializeOwned>(reader: &mut impl Read, max_len: usize) -> IoResult<T> {
    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;

    if version[0] != CODEC_VERSION {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("unsupported codec version: {} (expected {})", version[0], CODEC_VERSION),
        ));
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > max_len {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("record size {len} exceeds maximum {max_len}"),
        ));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;
    let stored_crc = u32::from_le_bytes(crc_bytes);
    let computed_crc = checksum(&data);

    if stored_crc != computed_crc {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("CRC mismatch: stored={stored_crc:08x}, computed={computed_crc:08x} (data corrupted)"),
        ));
    }

    serde_json::from_slice(&data)
        .map_err(|e| IoError::new(ErrorKind::InvalidData, format!("deserialization failed: {e}")))
}

/// Write the file header (magic + version).
pub fn write_header(writer: &mut impl Write) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[CODEC_VERSION])?;
    Ok(())
}

/// Read and validate the file header.
pub fn read_header(reader: &mut impl Read) -> IoResult<u8> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;

    if magic != MAGIC {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("invalid magic bytes: expected {MAGIC:?}, got {magic:?}"),
        ));
    }

    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;

    Ok(version[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use chrono::{TimeZone, Utc};

    use crate::entry::StreamEntry;

    const MAX: usize = 1024 * 1024;

    #[test]
    fn test_entry_list_roundtrip() {
        let mut entry = StreamEntry::new("twitch", "s1", "c1", Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        entry.channel.status = Some("speedrun".to_string());
        let list = vec![entry];

        let encoded = encode(&list).unwrap();
        let decoded: Vec<StreamEntry> = decode(&mut Cursor::new(encoded), MAX).unwrap();

        assert_eq!(decoded, list);
    }

    #[test]
    fn test_detects_corruption() {
        let mut encoded = encode("test data").unwrap();

        // Flip a byte inside the JSON payload
        encoded[8] ^= 0xFF;

        let result: IoResult<String> = decode(&mut Cursor::new(encoded), MAX);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_rejects_oversized_record() {
        let mut bad_data = vec![CODEC_VERSION];
        bad_data.extend_from_slice(&(200_000_000u32).to_le_bytes());

        let result: IoResult<String> = decode(&mut Cursor::new(bad_data), MAX);
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut encoded = encode("x").unwrap();
        encoded[0] = 99;

        let result: IoResult<String> = decode(&mut Cursor::new(encoded), MAX);
        assert!(result.unwrap_err().to_string().contains("unsupported codec version"));
    }

    #[test]
    fn test_header_roundtrip() {
        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();

        let version = read_header(&mut Cursor::new(buf)).unwrap();
        assert_eq!(version, CODEC_VERSION);
    }

    #[test]
    fn test_header_rejects_foreign_file() {
        let err = read_header(&mut Cursor::new(b"KYRO\x01".to_vec())).unwrap_err();
        assert!(err.to_string().contains("invalid magic bytes"));
    }
}
