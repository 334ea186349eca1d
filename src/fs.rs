use std::fmt::Write;
use std::sync::Arc;

use log::debug;

use crate::bitmap::FreeMap;
use crate::block_dev::BlockDevice;
use crate::config::*;
use crate::directory::Directory;
use crate::error::{FsError, Result};
use crate::file::OpenFile;
use crate::inode::FileHeader;
use crate::path;

/// The file-system facade: format/mount plus the path-based operations.
///
/// The free-map file and the root directory file are opened once at
/// construction and stay open for the facade's lifetime. Every mutating
/// operation loads fresh map and directory images, writes them back only on
/// success, and drops them on any failure, leaving the disk in its pre-call
/// state. Operations are strictly sequential; there is no locking.
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
    free_map_file: OpenFile<D>,
    root_dir_file: OpenFile<D>,
    // Descriptor table; slot 0 stays empty so id 0 can mean "none".
    open_files: Vec<Option<OpenFile<D>>>,
}

impl<D: BlockDevice> FileSystem<D> {
    /// Lays a fresh file system onto the device: the free map at sector 0,
    /// the root directory at sector 1, their data blocks behind them.
    pub fn format(device: Arc<D>) -> Result<Self> {
        debug!("formatting the file system");
        let mut free_map = FreeMap::new();
        free_map.mark(FREE_MAP_SECTOR)?;
        free_map.mark(DIRECTORY_SECTOR)?;

        let map_header = FileHeader::allocate(&*device, &mut free_map, FREE_MAP_FILE_SIZE)?;
        let dir_header = FileHeader::allocate(&*device, &mut free_map, DIRECTORY_FILE_SIZE)?;

        // Headers must hit the disk before the files can be opened.
        map_header.write_back(&*device, FREE_MAP_SECTOR)?;
        dir_header.write_back(&*device, DIRECTORY_SECTOR)?;

        let fs = Self {
            free_map_file: OpenFile::open(device.clone(), FREE_MAP_SECTOR)?,
            root_dir_file: OpenFile::open(device.clone(), DIRECTORY_SECTOR)?,
            open_files: (0..=MAX_OPEN_FILES).map(|_| None).collect(),
            device,
        };
        free_map.write_back(&fs.free_map_file)?;
        Directory::new().write_back(&fs.root_dir_file)?;
        Ok(fs)
    }

    /// Opens the two well-known files on an already-formatted disk.
    pub fn mount(device: Arc<D>) -> Result<Self> {
        debug!("mounting the file system");
        Ok(Self {
            free_map_file: OpenFile::open(device.clone(), FREE_MAP_SECTOR)?,
            root_dir_file: OpenFile::open(device.clone(), DIRECTORY_SECTOR)?,
            open_files: (0..=MAX_OPEN_FILES).map(|_| None).collect(),
            device,
        })
    }

    /// Walks every non-final component of `path` and returns the header
    /// sector of the containing directory plus the final name, unresolved.
    /// Each intermediate component must name an existing sub-directory.
    fn resolve_containing(&self, path: &str) -> Result<(u32, String)> {
        let parts = path::components(path)?;
        let mut dir_sector = DIRECTORY_SECTOR;
        for part in &parts[..parts.len() - 1] {
            let dir_file = OpenFile::open(self.device.clone(), dir_sector)?;
            let dir = Directory::fetch_from(&dir_file)?;
            let entry = dir.entry(part).ok_or(FsError::NotFound)?;
            if !entry.is_dir() {
                return Err(FsError::NotFound);
            }
            dir_sector = entry.sector();
        }
        Ok((dir_sector, parts[parts.len() - 1].to_string()))
    }

    /// Creates a file or sub-directory of a fixed size. Directories ignore
    /// `initial_size` and get an empty table (their freshly zeroed data
    /// sectors decode as one).
    pub fn create(&mut self, path: &str, initial_size: usize, is_dir: bool) -> Result<()> {
        let size = if is_dir { DIRECTORY_FILE_SIZE } else { initial_size };
        debug!("creating {path}, {size} bytes, dir: {is_dir}");

        let (dir_sector, name) = self.resolve_containing(path)?;
        let dir_file = OpenFile::open(self.device.clone(), dir_sector)?;
        let mut directory = Directory::fetch_from(&dir_file)?;
        if directory.find(&name).is_some() {
            return Err(FsError::AlreadyExists);
        }

        let mut free_map = FreeMap::fetch_from(&self.free_map_file)?;
        let header_sector = free_map.find_and_set().ok_or(FsError::NoSpaceOnDevice)?;
        directory.add(&name, header_sector, is_dir)?;
        let header = FileHeader::allocate(&*self.device, &mut free_map, size)?;

        // Everything worked; flush all three structures.
        header.write_back(&*self.device, header_sector)?;
        directory.write_back(&dir_file)?;
        free_map.write_back(&self.free_map_file)?;
        Ok(())
    }

    /// Opens a file and installs it in the descriptor table, returning the
    /// lowest free id in `1..=MAX_OPEN_FILES`.
    pub fn open(&mut self, path: &str) -> Result<usize> {
        debug!("opening {path}");
        let (dir_sector, name) = self.resolve_containing(path)?;
        let dir_file = OpenFile::open(self.device.clone(), dir_sector)?;
        let directory = Directory::fetch_from(&dir_file)?;
        let sector = directory.find(&name).ok_or(FsError::NotFound)?;
        let id = (1..self.open_files.len())
            .find(|&i| self.open_files[i].is_none())
            .ok_or(FsError::DescriptorTableFull)?;
        self.open_files[id] = Some(OpenFile::open(self.device.clone(), sector)?);
        Ok(id)
    }

    /// Reads up to `buf.len()` bytes at the descriptor's cursor.
    pub fn read(&mut self, id: usize, buf: &mut [u8]) -> Result<usize> {
        self.handle(id)?.read(buf)
    }

    /// Writes up to `buf.len()` bytes at the descriptor's cursor.
    pub fn write(&mut self, id: usize, buf: &[u8]) -> Result<usize> {
        self.handle(id)?.write(buf)
    }

    pub fn seek(&mut self, id: usize, pos: usize) -> Result<()> {
        self.handle(id)?.seek(pos);
        Ok(())
    }

    /// Length of the file behind a descriptor.
    pub fn length(&mut self, id: usize) -> Result<usize> {
        Ok(self.handle(id)?.length())
    }

    pub fn close(&mut self, id: usize) -> Result<()> {
        debug!("closing descriptor {id}");
        self.handle(id)?;
        self.open_files[id] = None;
        Ok(())
    }

    fn handle(&mut self, id: usize) -> Result<&mut OpenFile<D>> {
        self.open_files
            .get_mut(id)
            .and_then(|slot| slot.as_mut())
            .ok_or(FsError::NotFound)
    }

    /// Removes a file, or a directory sub-tree when `recursive`. A
    /// non-recursive removal of a non-empty directory removes the entry and
    /// its header chain and orphans the children's sectors.
    pub fn remove(&mut self, recursive: bool, path: &str) -> Result<()> {
        debug!("removing {path}, recursive: {recursive}");
        let (dir_sector, name) = self.resolve_containing(path)?;
        let dir_file = OpenFile::open(self.device.clone(), dir_sector)?;
        let mut directory = Directory::fetch_from(&dir_file)?;
        let (head_sector, entry_is_dir) = {
            let entry = directory.entry(&name).ok_or(FsError::NotFound)?;
            (entry.sector(), entry.is_dir())
        };

        if entry_is_dir && recursive {
            let sub_file = OpenFile::open(self.device.clone(), head_sector)?;
            let sub = Directory::fetch_from(&sub_file)?;
            for child in sub.entries() {
                let child_path = format!("{}/{}", path, child.name());
                self.remove(true, &child_path)?;
            }
        }

        let header = FileHeader::fetch_from(&*self.device, head_sector)?;
        let mut free_map = FreeMap::fetch_from(&self.free_map_file)?;
        header.deallocate(&mut free_map)?;
        free_map.clear(head_sector)?;
        directory.remove(&name)?;

        free_map.write_back(&self.free_map_file)?;
        directory.write_back(&dir_file)?;
        Ok(())
    }

    /// Renders the entries of `dir_path`, indented per depth when
    /// `recursive`. The root is handled explicitly; any other path must
    /// resolve to a sub-directory.
    pub fn list(&mut self, recursive: bool, dir_path: &str) -> Result<String> {
        let mut out = String::new();
        let _ = writeln!(out, "listing \"{dir_path}\"");
        if dir_path == "/" {
            let directory = Directory::fetch_from(&self.root_dir_file)?;
            directory.list(&self.device, recursive, 0, &mut out)?;
            return Ok(out);
        }
        let (dir_sector, name) = self.resolve_containing(dir_path)?;
        let dir_file = OpenFile::open(self.device.clone(), dir_sector)?;
        let directory = Directory::fetch_from(&dir_file)?;
        let entry = directory.entry(&name).ok_or(FsError::NotFound)?;
        if !entry.is_dir() {
            return Err(FsError::NotFound);
        }
        let target_file = OpenFile::open(self.device.clone(), entry.sector())?;
        let target = Directory::fetch_from(&target_file)?;
        target.list(&self.device, recursive, 0, &mut out)?;
        Ok(out)
    }

    /// Dumps the two well-known file headers, the free map and the root
    /// directory table, for diagnostics.
    pub fn dump(&self) -> Result<String> {
        let mut out = String::new();
        let map_header = FileHeader::fetch_from(&*self.device, FREE_MAP_SECTOR)?;
        let _ = writeln!(out, "free map file header:");
        out.push_str(&map_header.dump(&*self.device)?);
        let dir_header = FileHeader::fetch_from(&*self.device, DIRECTORY_SECTOR)?;
        let _ = writeln!(out, "root directory file header:");
        out.push_str(&dir_header.dump(&*self.device)?);
        let free_map = FreeMap::fetch_from(&self.free_map_file)?;
        let _ = writeln!(out, "{}", free_map.dump());
        let directory = Directory::fetch_from(&self.root_dir_file)?;
        out.push_str(&directory.dump());
        Ok(out)
    }

    /// Current number of free sectors, read through the free-map file.
    pub fn free_sectors(&self) -> Result<usize> {
        Ok(FreeMap::fetch_from(&self.free_map_file)?.num_clear())
    }

    pub fn device(&self) -> Arc<D> {
        self.device.clone()
    }
}
