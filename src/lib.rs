//! Pion is a tiny educational on-disk file system.
//! For simplicity, no support for permissions, timestamps, concurrent
//! access or growing a file after creation.
//!
//! Pion's linear layout on a fixed-size sectored device:
//! - Sector 0: header of the free-map file
//! - Sector 1: header of the root directory file
//! - Everything else: allocated on demand through the free map
//!
//! Both bookkeeping structures are ordinary files: the free map's bit array
//! and each directory's name table are the bodies of files reached through
//! their headers at the well-known sectors. A file header is a sector-sized
//! record of direct pointers, chained through successor headers once a file
//! outgrows one header's table.
//!
//! Pion's layers (from bottom to top):
//! 1. Block Device: sector-granular synchronous I/O.   | User implemented (hardware-specific)
//! 2. Free map: persistent sector allocator.           | Fs implemented
//! 3. File header: offset-to-sector translation.       | Fs implemented
//! 4. Open file: byte-level reads and writes.          | Fs implemented
//! 5. Directory/Path: name tables and path walking.    | Fs implemented
//! 6. FileSystem: format, create, open, remove, list.  | The user-facing facade

mod bitmap;
mod block_dev;
mod config;
mod directory;
mod error;
mod file;
mod fs;
mod inode;
mod path;

pub use bitmap::FreeMap;
pub use block_dev::BlockDevice;
pub use config::*;
pub use directory::{DirEntry, Directory};
pub use error::FsError as Error;
pub use error::{FsError, Result};
pub use file::OpenFile;
pub use fs::FileSystem;
pub use inode::FileHeader;
pub use path::components;
