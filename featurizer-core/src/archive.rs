//! Append-only binary archive used to persist transformers
//!
//! An [`Archive`] is either being written (created with [`Archive::new`]) or
//! being read (created with [`Archive::from_bytes`] over owned bytes, or
//! [`Archive::from_slice`] over borrowed ones). Writers append bytes and
//! finish with [`Archive::commit`]; readers consume bytes sequentially with no
//! random access. All multi-byte values are little-endian.
//!
//! Every transformer payload starts with a `(major, minor)` version header
//! written by [`Archive::write_version`] and checked by
//! [`Archive::expect_version`].

use std::borrow::Cow;
use std::fmt;

use crate::error::{Error, Result};

/// Direction an archive was opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveMode {
    /// Bytes are appended
    Serializing,
    /// Bytes are consumed from the front
    Deserializing,
}

/// Binary buffer with a write cursor or a read cursor
pub struct Archive<'a> {
    /// Raw bytes of the archive; readers may borrow them
    data: Cow<'a, [u8]>,

    /// Read position (only advances in deserializing mode)
    position: usize,

    /// Whether this archive is written to or read from
    mode: ArchiveMode,
}

impl Archive<'static> {
    /// Create an empty archive for serialization
    pub fn new() -> Self {
        Self {
            data: Cow::Owned(Vec::new()),
            position: 0,
            mode: ArchiveMode::Serializing,
        }
    }

    /// Create an empty archive with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Cow::Owned(Vec::with_capacity(capacity)),
            position: 0,
            mode: ArchiveMode::Serializing,
        }
    }

    /// Create an archive that reads a previously committed byte vector
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data: Cow::Owned(data),
            position: 0,
            mode: ArchiveMode::Deserializing,
        }
    }
}

impl<'a> Archive<'a> {
    /// Create an archive that reads borrowed bytes in place
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self {
            data: Cow::Borrowed(data),
            position: 0,
            mode: ArchiveMode::Deserializing,
        }
    }

    /// Mode this archive was opened in
    pub fn mode(&self) -> ArchiveMode {
        self.mode
    }

    /// Number of bytes written (serializing) or held (deserializing)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the archive holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes not yet consumed by a reader
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Check if a reader has consumed every byte
    pub fn at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Append raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.mode != ArchiveMode::Serializing {
            return Err(Error::InvalidOperation(
                "Cannot write to an archive opened for deserialization".into(),
            ));
        }

        self.data.to_mut().extend_from_slice(bytes);
        Ok(())
    }

    /// Consume exactly `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        if self.mode != ArchiveMode::Deserializing {
            return Err(Error::InvalidOperation(
                "Cannot read from an archive opened for serialization".into(),
            ));
        }

        if len > self.remaining() {
            return Err(Error::Serialization(format!(
                "Archive truncated: requested {len} bytes, {} available",
                self.remaining()
            )));
        }

        let start = self.position;
        self.position += len;
        Ok(&self.data[start..self.position])
    }

    /// Consume exactly `N` bytes into a fixed-size array
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Write the `(major, minor)` version header
    pub fn write_version(&mut self, major: u16, minor: u16) -> Result<()> {
        self.write_bytes(&major.to_le_bytes())?;
        self.write_bytes(&minor.to_le_bytes())
    }

    /// Read a `(major, minor)` version header
    pub fn read_version(&mut self) -> Result<(u16, u16)> {
        let major = u16::from_le_bytes(self.read_array()?);
        let minor = u16::from_le_bytes(self.read_array()?);
        Ok((major, minor))
    }

    /// Read a version header and fail unless it matches exactly
    pub fn expect_version(&mut self, major: u16, minor: u16) -> Result<()> {
        let found = self.read_version()?;
        if found != (major, minor) {
            return Err(Error::UnsupportedVersion {
                major: found.0,
                minor: found.1,
            });
        }
        Ok(())
    }

    /// Fail unless a reader consumed every byte
    ///
    /// Catches payloads that carry more fields than the reader knows.
    pub fn ensure_consumed(&self) -> Result<()> {
        if self.mode == ArchiveMode::Deserializing && !self.at_end() {
            return Err(Error::Serialization(format!(
                "{} unread bytes remain in archive",
                self.remaining()
            )));
        }
        Ok(())
    }

    /// Finalize the archive and return its bytes
    ///
    /// For a deserializing archive this fails unless every byte was consumed.
    pub fn commit(self) -> Result<Vec<u8>> {
        self.ensure_consumed()?;
        Ok(self.data.into_owned())
    }
}

impl Default for Archive<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Archive<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("mode", &self.mode)
            .field("len", &self.data.len())
            .field("position", &self.position)
            .finish()
    }
}
