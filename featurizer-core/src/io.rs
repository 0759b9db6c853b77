//! Persisting transformers to files
//!
//! Transformer archives are written through a buffered writer and read back
//! through a read-only memory map. The mapped bytes are decoded in place by
//! an [`Archive`] borrowing them.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};
use tracing::debug;

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::transformer::Transformer;

/// Read-only memory-mapped transformer archive
pub struct MappedArchive {
    /// The memory map
    mmap: Mmap,

    /// The path to the file
    path: PathBuf,
}

impl MappedArchive {
    /// Map an archive file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        if file.metadata()?.len() == 0 {
            return Err(Error::Serialization(format!(
                "Archive file {} is empty",
                path.display()
            )));
        }

        // SAFETY: the map is read-only and archive files are not modified
        // while a transformer is being loaded from them.
        #[allow(unsafe_code)]
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        Ok(Self { mmap, path })
    }

    /// Bytes of the archive
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    /// The path to the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the archive in bytes
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Whether the archive holds no bytes
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Decode a transformer, requiring every byte be consumed
    pub fn load<T: Transformer>(&self) -> Result<T> {
        T::from_slice(self.as_slice())
    }

    /// Reader over the mapped bytes
    pub fn archive(&self) -> Archive<'_> {
        Archive::from_slice(self.as_slice())
    }
}

/// Write `transformer` to `path`, replacing any existing file
pub fn save_transformer<T, P>(path: P, transformer: &T) -> Result<()>
where
    T: Transformer + ?Sized,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let bytes = transformer.to_bytes()?;

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;

    debug!(path = %path.display(), bytes = bytes.len(), "transformer saved");
    Ok(())
}

/// Load a transformer previously written by [`save_transformer`]
pub fn load_transformer<T, P>(path: P) -> Result<T>
where
    T: Transformer,
    P: AsRef<Path>,
{
    let archive = MappedArchive::open(path)?;
    let transformer = archive.load()?;
    debug!(path = %archive.path().display(), bytes = archive.len(), "transformer loaded");
    Ok(transformer)
}
