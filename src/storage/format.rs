//! Binary snapshot format for nets.
//!
//! ## Format Layout
//!
//! ```text
//! +------------------+
//! | Header (16 bytes)|
//! +------------------+
//! | Body (bincode)   |
//! +------------------+
//! ```
//!
//! ### Header (16 bytes)
//! - Magic number (4 bytes): "NNET"
//! - Version (2 bytes)
//! - Flags (2 bytes): reserved, 0
//! - Net kind (4 bytes): 1 = backpropagation, 2 = SOM
//! - Body length (4 bytes)
//!
//! The body holds the hyperparameters, the function descriptor name and the
//! exported graph.

use crate::error::{NetError, Result};
use crate::net::NetKind;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Magic number for net snapshot files.
const MAGIC: &[u8; 4] = b"NNET";

/// Current format version.
const VERSION: u16 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 16;

/// Snapshot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetHeader {
    /// Format version.
    pub version: u16,
    /// Flags.
    pub flags: u16,
    /// Kind of the stored net.
    pub kind: NetKind,
    /// Length of the body in bytes.
    pub body_len: u32,
}

impl NetHeader {
    /// Creates a header for a body of `body_len` bytes.
    pub fn new(kind: NetKind, body_len: u32) -> Self {
        Self { version: VERSION, flags: 0, kind, body_len }
    }

    /// Writes the header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(MAGIC);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.flags.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.kind.code().to_le_bytes());
        bytes[12..16].copy_from_slice(&self.body_len.to_le_bytes());
        bytes
    }

    /// Reads a header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(NetError::InvalidFormat("Header too short".to_string()));
        }
        if &bytes[0..4] != MAGIC {
            return Err(NetError::InvalidFormat("Invalid magic number".to_string()));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version > VERSION {
            return Err(NetError::InvalidFormat(format!("Unsupported version {}", version)));
        }
        let flags = u16::from_le_bytes([bytes[6], bytes[7]]);
        let code = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let kind = NetKind::from_code(code)
            .ok_or_else(|| NetError::InvalidFormat(format!("Unknown net kind {}", code)))?;
        let body_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

        Ok(Self { version, flags, kind, body_len })
    }
}

/// Reader/writer for net snapshots.
pub struct NetFormat;

impl NetFormat {
    /// Encodes a header plus `body` into a buffer.
    pub fn encode<T: Serialize>(kind: NetKind, body: &T) -> Result<Vec<u8>> {
        let body = bincode::serialize(body)?;
        let body_len = u32::try_from(body.len())
            .map_err(|_| NetError::Serialization("snapshot body exceeds 4 GiB".to_string()))?;

        let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
        bytes.extend_from_slice(&NetHeader::new(kind, body_len).to_bytes());
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Decodes a buffer produced by [`NetFormat::encode`], checking that it
    /// holds a net of kind `expected`.
    pub fn decode<T: DeserializeOwned>(bytes: &[u8], expected: NetKind) -> Result<T> {
        let header = NetHeader::from_bytes(bytes)?;
        if header.kind != expected {
            return Err(NetError::InvalidFormat(format!(
                "expected a {:?} net, found {:?}",
                expected, header.kind
            )));
        }
        let body = &bytes[HEADER_SIZE..];
        if body.len() != header.body_len as usize {
            return Err(NetError::InvalidFormat(format!(
                "body is {} bytes, header says {}",
                body.len(),
                header.body_len
            )));
        }
        Ok(bincode::deserialize(body)?)
    }

    /// Writes a snapshot file.
    pub fn write<P: AsRef<Path>, T: Serialize>(path: P, kind: NetKind, body: &T) -> Result<()> {
        let bytes = Self::encode(kind, body)?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads a snapshot file.
    pub fn read<P: AsRef<Path>, T: DeserializeOwned>(path: P, expected: NetKind) -> Result<T> {
        let mut bytes = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
        Self::decode(&bytes, expected)
    }

    /// Reads only the header of a snapshot file.
    pub fn read_header<P: AsRef<Path>>(path: P) -> Result<NetHeader> {
        let mut bytes = [0u8; HEADER_SIZE];
        File::open(path)?.read_exact(&mut bytes)?;
        NetHeader::from_bytes(&bytes)
    }
}
