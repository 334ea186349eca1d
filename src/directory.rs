use std::fmt::Write;
use std::sync::Arc;

use crate::block_dev::BlockDevice;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::file::OpenFile;
use crate::inode::{get_i32, put_i32};

/// One slot of a directory table: a name bound to the head header sector of
/// a file or sub-directory. On disk: in-use byte, directory byte, sector as
/// little-endian i32, then the zero-padded name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    in_use: bool,
    is_dir: bool,
    sector: u32,
    name: [u8; FILE_NAME_LEN],
}

impl DirEntry {
    const EMPTY: Self = Self {
        in_use: false,
        is_dir: false,
        sector: 0,
        name: [0; FILE_NAME_LEN],
    };

    fn new(name: &str, sector: u32, is_dir: bool) -> Self {
        let mut bytes = [0u8; FILE_NAME_LEN];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Self {
            in_use: true,
            is_dir,
            sector,
            name: bytes,
        }
    }

    fn decode(buf: &[u8]) -> Self {
        let mut name = [0u8; FILE_NAME_LEN];
        name.copy_from_slice(&buf[6..DIR_ENTRY_SIZE]);
        Self {
            in_use: buf[0] != 0,
            is_dir: buf[1] != 0,
            sector: get_i32(buf, 2) as u32,
            name,
        }
    }

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = self.in_use as u8;
        buf[1] = self.is_dir as u8;
        put_i32(buf, 2, self.sector as i32);
        buf[6..DIR_ENTRY_SIZE].copy_from_slice(&self.name);
    }

    /// Name comparison is byte-wise and case-sensitive.
    fn matches(&self, name: &str) -> bool {
        let trimmed = self.name_bytes();
        trimmed == name.as_bytes()
    }

    fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(FILE_NAME_LEN);
        &self.name[..end]
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn sector(&self) -> u32 {
        self.sector
    }
}

/// A sealed-capacity name table, stored as a regular file. A sub-directory
/// is just a file whose body is another directory serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    entries: [DirEntry; NUM_DIR_ENTRIES],
}

impl Directory {
    pub fn new() -> Self {
        Self {
            entries: [DirEntry::EMPTY; NUM_DIR_ENTRIES],
        }
    }

    /// Deserializes the table from the body of `file`.
    pub fn fetch_from<D: BlockDevice>(file: &OpenFile<D>) -> Result<Self> {
        let mut buf = [0u8; DIRECTORY_FILE_SIZE];
        if file.read_at(0, &mut buf)? != DIRECTORY_FILE_SIZE {
            return Err(FsError::IoError);
        }
        let mut entries = [DirEntry::EMPTY; NUM_DIR_ENTRIES];
        for (i, entry) in entries.iter_mut().enumerate() {
            *entry = DirEntry::decode(&buf[i * DIR_ENTRY_SIZE..(i + 1) * DIR_ENTRY_SIZE]);
        }
        Ok(Self { entries })
    }

    /// Serializes the table as the body of `file`.
    pub fn write_back<D: BlockDevice>(&self, file: &OpenFile<D>) -> Result<()> {
        let mut buf = [0u8; DIRECTORY_FILE_SIZE];
        for (i, entry) in self.entries.iter().enumerate() {
            entry.encode(&mut buf[i * DIR_ENTRY_SIZE..(i + 1) * DIR_ENTRY_SIZE]);
        }
        if file.write_at(0, &buf)? != DIRECTORY_FILE_SIZE {
            return Err(FsError::IoError);
        }
        Ok(())
    }

    pub fn entry(&self, name: &str) -> Option<&DirEntry> {
        self.entries.iter().find(|e| e.in_use && e.matches(name))
    }

    /// Head header sector of the named file, if present.
    pub fn find(&self, name: &str) -> Option<u32> {
        self.entry(name).map(|e| e.sector)
    }

    pub fn is_dir(&self, name: &str) -> bool {
        self.entry(name).is_some_and(|e| e.is_dir)
    }

    /// Binds `name` to `sector` in the first free slot. Within one
    /// directory, in-use names are unique.
    pub fn add(&mut self, name: &str, sector: u32, is_dir: bool) -> Result<()> {
        if name.is_empty() || name.len() > FILE_NAME_LEN {
            return Err(FsError::InvalidFileName);
        }
        if self.entry(name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let slot = self
            .entries
            .iter_mut()
            .find(|e| !e.in_use)
            .ok_or(FsError::DirectoryFull)?;
        *slot = DirEntry::new(name, sector, is_dir);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.in_use && e.matches(name))
            .ok_or(FsError::NotFound)?;
        entry.in_use = false;
        Ok(())
    }

    /// The in-use entries, in table order.
    pub fn entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| e.in_use)
    }

    /// Appends the entry names to `out`, two spaces of indent per depth,
    /// directories suffixed with `/` and, when `recursive`, expanded in
    /// place by fetching their files from disk.
    pub fn list<D: BlockDevice>(
        &self,
        device: &Arc<D>,
        recursive: bool,
        indent: usize,
        out: &mut String,
    ) -> Result<()> {
        for entry in self.entries() {
            for _ in 0..indent {
                out.push_str("  ");
            }
            out.push_str(&entry.name());
            if entry.is_dir {
                out.push('/');
            }
            out.push('\n');
            if recursive && entry.is_dir {
                let sub_file = OpenFile::open(device.clone(), entry.sector)?;
                let sub = Directory::fetch_from(&sub_file)?;
                sub.list(device, recursive, indent + 1, out)?;
            }
        }
        Ok(())
    }

    /// Table dump for diagnostics.
    pub fn dump(&self) -> String {
        let mut out = String::from("directory contents:\n");
        for entry in self.entries() {
            let _ = writeln!(
                out,
                "  {} sector {}{}",
                entry.name(),
                entry.sector,
                if entry.is_dir { " (dir)" } else { "" }
            );
        }
        out
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_find_remove() {
        let mut dir = Directory::new();
        dir.add("a", 7, false).unwrap();
        dir.add("b", 9, true).unwrap();
        assert_eq!(dir.find("a"), Some(7));
        assert!(dir.is_dir("b"));
        assert!(!dir.is_dir("a"));
        assert_eq!(dir.add("a", 11, false), Err(FsError::AlreadyExists));
        dir.remove("a").unwrap();
        assert_eq!(dir.find("a"), None);
        assert_eq!(dir.remove("a"), Err(FsError::NotFound));
    }

    #[test]
    fn capacity_is_sealed() {
        let mut dir = Directory::new();
        for i in 0..NUM_DIR_ENTRIES {
            dir.add(&format!("f{i}"), i as u32 + 2, false).unwrap();
        }
        assert_eq!(dir.add("over", 40, false), Err(FsError::DirectoryFull));
        // Removal frees a slot for reuse.
        dir.remove("f3").unwrap();
        dir.add("over", 40, false).unwrap();
        assert_eq!(dir.find("over"), Some(40));
    }

    #[test]
    fn names_are_bounded_and_case_sensitive() {
        let mut dir = Directory::new();
        assert_eq!(dir.add("", 2, false), Err(FsError::InvalidFileName));
        assert_eq!(
            dir.add("elevenchars", 2, false),
            Err(FsError::InvalidFileName)
        );
        dir.add("Readme", 2, false).unwrap();
        assert_eq!(dir.find("readme"), None);
        assert_eq!(dir.find("Readme"), Some(2));
    }

    #[test]
    fn entry_codec_round_trips() {
        let entry = DirEntry::new("notes.txt", 23, false);
        let mut buf = [0u8; DIR_ENTRY_SIZE];
        entry.encode(&mut buf);
        assert_eq!(DirEntry::decode(&buf), entry);

        let mut dir = Directory::new();
        dir.add("d", 5, true).unwrap();
        let mut body = [0u8; DIRECTORY_FILE_SIZE];
        for (i, entry) in dir.entries.iter().enumerate() {
            entry.encode(&mut body[i * DIR_ENTRY_SIZE..(i + 1) * DIR_ENTRY_SIZE]);
        }
        let decoded = DirEntry::decode(&body[..DIR_ENTRY_SIZE]);
        assert!(decoded.is_dir());
        assert_eq!(decoded.sector(), 5);
        assert_eq!(decoded.name(), "d");
    }
}
