//! Common utilities for tests
#![allow(unused)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use pion::*;

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($($arg:tt)+) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($($arg)+), crate::common::RESET)
    };
}

/// Routes the library's `log` output into the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug)]
pub struct RamDisk {
    inner: Arc<Mutex<Vec<u8>>>,
    num_sectors: usize,
}

impl RamDisk {
    /// Creates a new RamDisk with the specified number of sectors.
    /// Each sector is SECTOR_SIZE bytes.
    pub fn new(num_sectors: usize) -> Self {
        let size = num_sectors * SECTOR_SIZE;
        let inner = Arc::new(Mutex::new(vec![0u8; size]));
        RamDisk { inner, num_sectors }
    }
}

impl BlockDevice for RamDisk {
    fn num_sectors(&self) -> usize {
        self.num_sectors
    }

    fn read_sector(&self, sector: u32, buf: &mut [u8; SECTOR_SIZE]) -> std::result::Result<(), Error> {
        if sector as usize >= self.num_sectors {
            return Err(Error::InvalidSector);
        }
        let start = sector as usize * SECTOR_SIZE;
        let data = self.inner.lock().unwrap();
        buf.copy_from_slice(&data[start..start + SECTOR_SIZE]);
        Ok(())
    }

    fn write_sector(&self, sector: u32, buf: &[u8; SECTOR_SIZE]) -> std::result::Result<(), Error> {
        if sector as usize >= self.num_sectors {
            return Err(Error::InvalidSector);
        }
        let start = sector as usize * SECTOR_SIZE;
        let mut data = self.inner.lock().unwrap();
        data[start..start + SECTOR_SIZE].copy_from_slice(buf);
        Ok(())
    }
}

/// A freshly formatted file system on a RamDisk of `NUM_SECTORS` sectors.
pub fn fresh_fs() -> FileSystem<RamDisk> {
    init_logging();
    FileSystem::format(Arc::new(RamDisk::new(NUM_SECTORS))).unwrap()
}

/// Asserts the on-disk free map against reachability: a bit is set iff the
/// sector is reachable from the two well-known headers or, transitively,
/// from an in-use directory entry, and no sector is referenced twice.
pub fn check_consistency<D: BlockDevice>(fs: &FileSystem<D>) {
    let device = fs.device();
    let mut referenced = Vec::new();
    collect_file(&device, FREE_MAP_SECTOR, false, &mut referenced);
    collect_file(&device, DIRECTORY_SECTOR, true, &mut referenced);

    let unique: BTreeSet<u32> = referenced.iter().copied().collect();
    assert_eq!(
        unique.len(),
        referenced.len(),
        "a sector is referenced twice: {referenced:?}"
    );

    let map_file = OpenFile::open(device.clone(), FREE_MAP_SECTOR).unwrap();
    let map = FreeMap::fetch_from(&map_file).unwrap();
    for sector in 0..NUM_SECTORS as u32 {
        assert_eq!(
            map.test(sector),
            unique.contains(&sector),
            "free map disagrees with reachability at sector {sector}"
        );
    }
}

fn collect_file<D: BlockDevice>(device: &Arc<D>, sector: u32, is_dir: bool, acc: &mut Vec<u32>) {
    acc.push(sector);
    let header = FileHeader::fetch_from(&**device, sector).unwrap();

    // Chain arithmetic: data sectors cover the length exactly, and every
    // non-terminal segment must be full for the tail to land where it does.
    let data_sectors = header.data_sectors().count();
    assert_eq!(
        data_sectors,
        (header.len() + SECTOR_SIZE - 1) / SECTOR_SIZE,
        "data sector count mismatch at header {sector}"
    );
    if header.segment_count() > 1 {
        assert!(
            header.len() > (header.segment_count() - 1) * MAX_FILE_SIZE,
            "short non-terminal segment at header {sector}"
        );
    }

    acc.extend(header.successor_sectors());
    acc.extend(header.data_sectors());
    if is_dir {
        let file = OpenFile::open(device.clone(), sector).unwrap();
        let dir = Directory::fetch_from(&file).unwrap();
        for entry in dir.entries() {
            collect_file(device, entry.sector(), entry.is_dir(), acc);
        }
    }
}
