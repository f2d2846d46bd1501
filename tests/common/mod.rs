//! External-allocator stand-in.
//!
//! Tests attach to regions this builder lays out byte-by-byte from the
//! public constants, the same way the native allocator does: header,
//! descriptor table, then one slot band per channel with every slot's
//! sequence word initialized to its index. Building from raw offsets
//! (rather than the library's own structs) doubles as a check that the
//! `repr(C)` layout matches the wire contract.

#![allow(dead_code)]

use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

use dmxp::constants::{
    CHANNEL_DESCRIPTOR_SIZE, CHANNEL_TABLE_OFFSET, MAGIC, MAX_CHANNELS, REGION_MIN_SIZE,
    REGION_VERSION, SLOT_SIZE,
};

pub struct RegionBuilder {
    name: String,
    magic: u64,
    version: u32,
    channels: Vec<(u32, u64)>,
}

impl RegionBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            magic: MAGIC,
            version: REGION_VERSION,
            channels: Vec::new(),
        }
    }

    pub fn magic(mut self, magic: u64) -> Self {
        self.magic = magic;
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Add a channel; bands are laid out after the table in call order.
    pub fn channel(mut self, id: u32, capacity: u64) -> Self {
        self.channels.push((id, capacity));
        self
    }

    pub fn build(self) -> RegionFixture {
        let band_total: u64 = self.channels.iter().map(|(_, c)| c * SLOT_SIZE as u64).sum();
        let mut image = vec![0u8; REGION_MIN_SIZE + band_total as usize];

        image[0..8].copy_from_slice(&self.magic.to_le_bytes());
        image[8..12].copy_from_slice(&self.version.to_le_bytes());
        image[12..16].copy_from_slice(&(MAX_CHANNELS as u32).to_le_bytes());
        image[16..20].copy_from_slice(&(self.channels.len() as u32).to_le_bytes());

        let mut band_offset = REGION_MIN_SIZE as u64;
        for (id, capacity) in &self.channels {
            let desc = CHANNEL_TABLE_OFFSET + *id as usize * CHANNEL_DESCRIPTOR_SIZE;
            image[desc..desc + 4].copy_from_slice(&id.to_le_bytes());
            image[desc + 8..desc + 16].copy_from_slice(&capacity.to_le_bytes());
            image[desc + 16..desc + 24].copy_from_slice(&band_offset.to_le_bytes());
            // tail (desc+128) and head (desc+256) start at 0.

            for i in 0..*capacity {
                let slot = band_offset as usize + i as usize * SLOT_SIZE;
                image[slot..slot + 8].copy_from_slice(&i.to_le_bytes());
            }
            band_offset += capacity * SLOT_SIZE as u64;
        }

        let path = std::env::temp_dir().join(format!(
            "dmxp-{}-{}",
            self.name,
            std::process::id()
        ));
        fs::write(&path, &image).unwrap();
        RegionFixture { path }
    }
}

/// A region file on disk; removed on drop.
pub struct RegionFixture {
    pub path: PathBuf,
}

impl RegionFixture {
    pub fn bytes(&self) -> Vec<u8> {
        fs::read(&self.path).unwrap()
    }

    pub fn read_u64(&self, offset: usize) -> u64 {
        let bytes = self.bytes();
        u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
    }

    /// Patch a word in place (no truncation, safe while the file is
    /// mapped elsewhere in this process).
    pub fn write_u64(&self, offset: usize, value: u64) {
        let mut file = fs::OpenOptions::new().write(true).open(&self.path).unwrap();
        file.seek(SeekFrom::Start(offset as u64)).unwrap();
        file.write_all(&value.to_le_bytes()).unwrap();
    }

    /// Offset of channel `id`'s descriptor.
    pub fn descriptor_offset(&self, id: u32) -> usize {
        CHANNEL_TABLE_OFFSET + id as usize * CHANNEL_DESCRIPTOR_SIZE
    }

    /// Offset of slot `index` in the first band (which starts right after
    /// the descriptor table).
    pub fn first_band_slot_offset(&self, index: u64) -> usize {
        REGION_MIN_SIZE + index as usize * SLOT_SIZE
    }
}

impl Drop for RegionFixture {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
