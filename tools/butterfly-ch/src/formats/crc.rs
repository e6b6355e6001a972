//! CRC-64 checksums for graph files (trailing 8-byte little-endian footer)

use crc::{Crc, CRC_64_GO_ISO};

pub const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

pub const FOOTER_LEN: usize = 8;

pub fn checksum(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}

/// Incremental digest, for writers that stream their payload
pub struct Digest {
    digest: crc::Digest<'static, u64>,
}

impl Digest {
    pub fn new() -> Self {
        Self {
            digest: CRC64.digest(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    pub fn finalize(self) -> u64 {
        self.digest.finalize()
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `data` into payload and stored checksum, `None` if too short
pub fn split_footer(data: &[u8]) -> Option<(&[u8], u64)> {
    let payload_len = data.len().checked_sub(FOOTER_LEN)?;
    let (payload, footer) = data.split_at(payload_len);
    let stored = u64::from_le_bytes(footer.try_into().ok()?);
    Some((payload, stored))
}

/// Whether the footer matches the payload checksum
pub fn verify_footer(data: &[u8]) -> bool {
    split_footer(data).is_some_and(|(payload, stored)| checksum(payload) == stored)
}
