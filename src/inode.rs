//! The on-disk file header (in UNIX terms, the i-node): a sector-sized
//! record mapping a file's byte offsets to data sectors, chained through
//! successor headers when the file outgrows one header's direct table.

use std::fmt::Write;

use log::trace;

use crate::bitmap::FreeMap;
use crate::block_dev::BlockDevice;
use crate::config::*;
use crate::error::{FsError, Result};

/// One header's worth of a file: byte count, sector count, successor
/// sector and the direct pointer table. Serialized into a single sector as
/// consecutive little-endian i32 fields, `-1` standing for "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    num_bytes: u32,
    num_sectors: u32,
    next: Option<u32>,
    data_sectors: [Option<u32>; NUM_DIRECT],
}

impl Segment {
    fn empty() -> Self {
        Self {
            num_bytes: 0,
            num_sectors: 0,
            next: None,
            data_sectors: [None; NUM_DIRECT],
        }
    }

    fn decode(buf: &[u8; SECTOR_SIZE]) -> Self {
        let mut data_sectors = [None; NUM_DIRECT];
        for (i, slot) in data_sectors.iter_mut().enumerate() {
            *slot = sector_from_wire(get_i32(buf, 12 + i * 4));
        }
        Self {
            num_bytes: get_i32(buf, 0) as u32,
            num_sectors: get_i32(buf, 4) as u32,
            next: sector_from_wire(get_i32(buf, 8)),
            data_sectors,
        }
    }

    fn encode(&self, buf: &mut [u8; SECTOR_SIZE]) {
        put_i32(buf, 0, self.num_bytes as i32);
        put_i32(buf, 4, self.num_sectors as i32);
        put_i32(buf, 8, sector_to_wire(self.next));
        for (i, slot) in self.data_sectors.iter().enumerate() {
            put_i32(buf, 12 + i * 4, sector_to_wire(*slot));
        }
    }
}

/// A whole inode chain, owned as a flat list of segments. The head
/// segment's sector is the only externally held handle (a directory entry);
/// successor sectors live inside the chain itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    segments: Vec<Segment>,
}

impl FileHeader {
    /// Builds a header chain for a new file of `bytes` bytes, taking data
    /// and successor-header sectors from `free_map` and zeroing each data
    /// sector on disk. Fails with `NoSpaceOnDevice` without completing
    /// partially; the caller is expected to discard the map on failure.
    ///
    /// `bytes == 0` yields a legal empty file: one segment, no sectors.
    /// A successor is created only strictly above `MAX_FILE_SIZE` bytes.
    pub fn allocate<D: BlockDevice>(
        device: &D,
        free_map: &mut FreeMap,
        bytes: usize,
    ) -> Result<Self> {
        let mut segments = Vec::new();
        let mut remaining = bytes;
        loop {
            let mut segment = Segment::empty();
            segment.num_bytes = remaining.min(MAX_FILE_SIZE) as u32;
            segment.num_sectors =
                ((segment.num_bytes as usize + SECTOR_SIZE - 1) / SECTOR_SIZE) as u32;

            // No partial allocation within a segment: check the whole
            // segment against the map before taking the first sector.
            if free_map.num_clear() < segment.num_sectors as usize {
                return Err(FsError::NoSpaceOnDevice);
            }
            let zeroes = [0u8; SECTOR_SIZE];
            for slot in segment.data_sectors.iter_mut().take(segment.num_sectors as usize) {
                let sector = free_map.find_and_set().ok_or(FsError::NoSpaceOnDevice)?;
                device.write_sector(sector, &zeroes)?;
                *slot = Some(sector);
            }

            if remaining > MAX_FILE_SIZE {
                let next = free_map.find_and_set().ok_or(FsError::NoSpaceOnDevice)?;
                segment.next = Some(next);
                segments.push(segment);
                remaining -= MAX_FILE_SIZE;
            } else {
                segments.push(segment);
                break;
            }
        }
        trace!(
            "allocated {} bytes across {} header sector(s)",
            bytes,
            segments.len()
        );
        Ok(Self { segments })
    }

    /// Returns every data sector and every successor-header sector to the
    /// map. The head header sector is owned by the directory entry and is
    /// cleared by the caller.
    pub fn deallocate(&self, free_map: &mut FreeMap) -> Result<()> {
        for segment in &self.segments {
            for sector in segment.data_sectors.iter().flatten() {
                free_map.clear(*sector)?;
            }
            if let Some(next) = segment.next {
                free_map.clear(next)?;
            }
        }
        Ok(())
    }

    /// Reads the chain starting at `sector`, following successor links.
    pub fn fetch_from<D: BlockDevice>(device: &D, sector: u32) -> Result<Self> {
        let mut segments = Vec::new();
        let mut buf = [0u8; SECTOR_SIZE];
        let mut at = Some(sector);
        while let Some(current) = at {
            device.read_sector(current, &mut buf)?;
            let segment = Segment::decode(&buf);
            at = segment.next;
            segments.push(segment);
        }
        Ok(Self { segments })
    }

    /// Writes the head segment at `sector` and each successor at the
    /// sector recorded in its predecessor.
    pub fn write_back<D: BlockDevice>(&self, device: &D, sector: u32) -> Result<()> {
        let mut buf = [0u8; SECTOR_SIZE];
        let mut at = sector;
        for segment in &self.segments {
            segment.encode(&mut buf);
            device.write_sector(at, &buf)?;
            if let Some(next) = segment.next {
                at = next;
            }
        }
        Ok(())
    }

    /// Translates a byte offset into the data sector holding it. `None`
    /// beyond the allocated range.
    pub fn byte_to_sector(&self, offset: usize) -> Option<u32> {
        let segment = self.segments.get(offset / MAX_FILE_SIZE)?;
        let slot = (offset % MAX_FILE_SIZE) / SECTOR_SIZE;
        segment.data_sectors.get(slot).copied().flatten()
    }

    /// Total bytes in the file: the sum of segment byte counts.
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.num_bytes as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of header sectors in the chain.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Every data sector in chain order.
    pub fn data_sectors(&self) -> impl Iterator<Item = u32> + '_ {
        self.segments
            .iter()
            .flat_map(|s| s.data_sectors.iter().copied().flatten())
    }

    /// Every successor-header sector (the head sector is not included; it
    /// is held by the directory entry).
    pub fn successor_sectors(&self) -> impl Iterator<Item = u32> + '_ {
        self.segments.iter().filter_map(|s| s.next)
    }

    /// Header fields plus file contents, each data sector's bytes printed
    /// directly as ASCII or escaped hex.
    pub fn dump<D: BlockDevice>(&self, device: &D) -> Result<String> {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "file header: {} bytes, {} segment(s)",
            self.len(),
            self.segments.len()
        );
        for segment in &self.segments {
            let _ = write!(out, "  sectors:");
            for sector in segment.data_sectors.iter().flatten() {
                let _ = write!(out, " {sector}");
            }
            out.push('\n');
        }
        let _ = writeln!(out, "contents:");
        let mut buf = [0u8; SECTOR_SIZE];
        let mut printed = 0;
        for sector in self.data_sectors() {
            device.read_sector(sector, &mut buf)?;
            let take = SECTOR_SIZE.min(self.len() - printed);
            for &byte in &buf[..take] {
                if (0x20..=0x7e).contains(&byte) {
                    out.push(byte as char);
                } else {
                    let _ = write!(out, "\\{byte:02x}");
                }
            }
            printed += take;
            out.push('\n');
        }
        Ok(out)
    }
}

pub(crate) fn get_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

pub(crate) fn put_i32(buf: &mut [u8], at: usize, value: i32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn sector_from_wire(value: i32) -> Option<u32> {
    (value >= 0).then_some(value as u32)
}

fn sector_to_wire(sector: Option<u32>) -> i32 {
    sector.map_or(-1, |s| s as i32)
}
