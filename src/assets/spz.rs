//! `.spz` splat container header.
//!
//! An `.spz` file is a gzip stream whose payload starts with a 16 byte
//! little-endian header: magic `NGSP`, version, point count, SH degree,
//! fractional bits, flags and one reserved byte.

use flate2::read::GzDecoder;
use std::io::Read;

pub const SPZ_MAGIC: u32 = 0x5053_474e;
pub const SPZ_HEADER_LEN: usize = 16;
const SUPPORTED_VERSIONS: std::ops::RangeInclusive<u32> = 1..=3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpzHeader {
    pub version: u32,
    pub num_points: u32,
    pub sh_degree: u8,
    pub fractional_bits: u8,
    pub flags: u8,
}

impl SpzHeader {
    pub fn antialiased(&self) -> bool {
        self.flags & 0x1 != 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpzError {
    #[error("spz stream is not valid gzip: {0}")]
    Gzip(#[from] std::io::Error),
    #[error("spz header truncated ({0} bytes)")]
    Truncated(usize),
    #[error("bad spz magic 0x{0:08x}")]
    BadMagic(u32),
    #[error("unsupported spz version {0}")]
    UnsupportedVersion(u32),
}

pub fn read_header(bytes: &[u8]) -> Result<SpzHeader, SpzError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut header = [0u8; SPZ_HEADER_LEN];
    let mut filled = 0;
    while filled < SPZ_HEADER_LEN {
        let read = decoder.read(&mut header[filled..])?;
        if read == 0 {
            return Err(SpzError::Truncated(filled));
        }
        filled += read;
    }

    let word = |offset: usize| {
        u32::from_le_bytes([
            header[offset],
            header[offset + 1],
            header[offset + 2],
            header[offset + 3],
        ])
    };
    let magic = word(0);
    if magic != SPZ_MAGIC {
        return Err(SpzError::BadMagic(magic));
    }
    let version = word(4);
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(SpzError::UnsupportedVersion(version));
    }
    Ok(SpzHeader {
        version,
        num_points: word(8),
        sh_degree: header[12],
        fractional_bits: header[13],
        flags: header[14],
    })
}

#[cfg(test)]
pub(crate) fn encode_header(version: u32, num_points: u32) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut raw = Vec::with_capacity(SPZ_HEADER_LEN + 8);
    raw.extend_from_slice(&SPZ_MAGIC.to_le_bytes());
    raw.extend_from_slice(&version.to_le_bytes());
    raw.extend_from_slice(&num_points.to_le_bytes());
    raw.extend_from_slice(&[3, 12, 1, 0]);
    raw.extend_from_slice(&[0u8; 8]);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&raw).unwrap();
    encoder.finish().unwrap()
}
