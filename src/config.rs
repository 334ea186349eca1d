//! Disk geometry and layout constants, fixed for the life of a disk image.

use core::mem::size_of;

/// Bytes per sector, the unit of all device I/O.
pub const SECTOR_SIZE: usize = 128;
/// Total sectors on the disk.
pub const NUM_SECTORS: usize = 64;

/// Well-known header sector of the free-map file.
pub const FREE_MAP_SECTOR: u32 = 0;
/// Well-known header sector of the root directory file.
pub const DIRECTORY_SECTOR: u32 = 1;

const HEADER_INT: usize = size_of::<i32>();

/// Direct sector pointers per file header. Three i32 scalars (byte count,
/// sector count, successor sector) share the sector with the pointer table,
/// so one encoded header fills a sector exactly.
pub const NUM_DIRECT: usize = (SECTOR_SIZE - 3 * HEADER_INT) / HEADER_INT;
/// Data bytes addressable by a single header before chaining.
pub const MAX_FILE_SIZE: usize = NUM_DIRECT * SECTOR_SIZE;

/// Maximum file-name bytes per directory entry; shorter names are
/// zero-padded on disk.
pub const FILE_NAME_LEN: usize = 10;
/// On-disk bytes per directory entry: in-use flag, directory flag,
/// header sector, name.
pub const DIR_ENTRY_SIZE: usize = 2 * size_of::<u8>() + size_of::<i32>() + FILE_NAME_LEN;
/// Fixed capacity of every directory.
pub const NUM_DIR_ENTRIES: usize = 10;

/// Body size of a directory stored as a file.
pub const DIRECTORY_FILE_SIZE: usize = NUM_DIR_ENTRIES * DIR_ENTRY_SIZE;
/// Body size of the free-map file: one bit per sector, packed into bytes.
pub const FREE_MAP_FILE_SIZE: usize = (NUM_SECTORS + 7) / 8;

/// Capacity of the open-file descriptor table; id 0 is reserved.
pub const MAX_OPEN_FILES: usize = 20;

const _: () = assert!((3 + NUM_DIRECT) * HEADER_INT <= SECTOR_SIZE);
const _: () = assert!(NUM_SECTORS <= i32::MAX as usize);
