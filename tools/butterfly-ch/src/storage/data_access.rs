//! Growable arrays of 32-bit words backing the node and edge tables
//!
//! A [`Directory`] hands out named [`DataAccess`] objects. Two backends:
//! - [`RamDataAccess`]: a `Vec<u32>`, optionally written to `<root>/<name>` on `persist`
//! - [`MmapDataAccess`]: a memory-mapped file under `<root>/<name>`, grown with `set_len`
//!
//! Reads and writes beyond the current capacity panic: callers grow first.

use butterfly_common::Result;
use memmap2::MmapMut;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const WORD: u64 = 4;
const MIN_MMAP_BYTES: u64 = 4096;

pub trait DataAccess: Send + Sync {
    fn name(&self) -> &str;

    /// Capacity in bytes
    fn capacity(&self) -> u64;

    /// Ensure at least `bytes` are addressable. Never shrinks, keeps existing content.
    fn grow_to(&mut self, bytes: u64) -> Result<()>;

    fn get(&self, index: u64) -> u32;

    fn set(&mut self, index: u64, value: u32);

    /// Write content to the backing medium, if any
    fn persist(&mut self) -> Result<()>;
}

pub trait Directory {
    type Access: DataAccess;

    fn find_create(&self, name: &str) -> Result<Self::Access>;
}

/// Heap-backed data access
#[derive(Debug, Clone, Default)]
pub struct RamDataAccess {
    name: String,
    words: Vec<u32>,
    path: Option<PathBuf>,
}

impl RamDataAccess {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            words: Vec::new(),
            path: None,
        }
    }

    pub fn with_path(name: &str, path: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            words: Vec::new(),
            path: Some(path),
        }
    }

    /// Wrap already loaded words
    pub fn from_words(name: &str, words: Vec<u32>) -> Self {
        Self {
            name: name.to_string(),
            words,
            path: None,
        }
    }
}

impl DataAccess for RamDataAccess {
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity(&self) -> u64 {
        self.words.len() as u64 * WORD
    }

    fn grow_to(&mut self, bytes: u64) -> Result<()> {
        let words = bytes.div_ceil(WORD) as usize;
        if words > self.words.len() {
            self.words.resize(words, 0);
        }
        Ok(())
    }

    #[inline]
    fn get(&self, index: u64) -> u32 {
        self.words[index as usize]
    }

    #[inline]
    fn set(&mut self, index: u64, value: u32) {
        self.words[index as usize] = value;
    }

    fn persist(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut writer = BufWriter::new(File::create(path)?);
        for word in &self.words {
            writer.write_all(&word.to_le_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Memory-mapped, file-backed data access
#[derive(Debug)]
pub struct MmapDataAccess {
    name: String,
    path: PathBuf,
    file: File,
    mmap: MmapMut,
}

impl MmapDataAccess {
    /// Create (truncate) the backing file and map it
    pub fn create(name: &str, path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(MIN_MMAP_BYTES)?;
        // SAFETY: the file was just created by us and is only mutated through this mapping.
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            file,
            mmap,
        })
    }
}

impl DataAccess for MmapDataAccess {
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn grow_to(&mut self, bytes: u64) -> Result<()> {
        let bytes = bytes.div_ceil(WORD) * WORD;
        if bytes <= self.capacity() {
            return Ok(());
        }
        tracing::debug!(table = %self.name, path = %self.path.display(), bytes, "remapping table");
        self.mmap.flush()?;
        self.file.set_len(bytes)?;
        // SAFETY: same file as before, remapped after growing; the old mapping is dropped here.
        let mmap = unsafe { MmapMut::map_mut(&self.file)? };
        self.mmap = mmap;
        Ok(())
    }

    #[inline]
    fn get(&self, index: u64) -> u32 {
        let offset = (index * WORD) as usize;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.mmap[offset..offset + 4]);
        u32::from_le_bytes(buf)
    }

    #[inline]
    fn set(&mut self, index: u64, value: u32) {
        let offset = (index * WORD) as usize;
        self.mmap[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn persist(&mut self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }
}

/// Directory of in-memory data access objects
#[derive(Debug, Clone, Default)]
pub struct RamDirectory {
    root: Option<PathBuf>,
}

impl RamDirectory {
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Persist data access objects as raw files under `root`
    pub fn persistent<P: AsRef<Path>>(root: P) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: Some(root.as_ref().to_path_buf()),
        })
    }
}

impl Directory for RamDirectory {
    type Access = RamDataAccess;

    fn find_create(&self, name: &str) -> Result<RamDataAccess> {
        Ok(match &self.root {
            Some(root) => RamDataAccess::with_path(name, root.join(name)),
            None => RamDataAccess::new(name),
        })
    }
}

/// Directory of memory-mapped data access objects
#[derive(Debug, Clone)]
pub struct MmapDirectory {
    root: PathBuf,
}

impl MmapDirectory {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }
}

impl Directory for MmapDirectory {
    type Access = MmapDataAccess;

    fn find_create(&self, name: &str) -> Result<MmapDataAccess> {
        MmapDataAccess::create(name, &self.root.join(name))
    }
}
