//! Cartridge image parsing.
//!
//! Implements the [iNES](https://www.nesdev.org/wiki/INES) layout: a 16-byte
//! header (PRG size in 16 KiB units at byte 4, CHR size in 8 KiB units at
//! byte 5, mapper number split across the high nibbles of bytes 6–7,
//! mirroring and ignore-mirroring flags in byte 6), then PRG chunks, then CHR
//! chunks. A second constructor takes the header fields out-of-band for
//! images shipped with the header region zeroed; leaving no readable header
//! in the binary deters casual inspection of bundled games.

use thiserror::Error;

use crate::cartridge::mapper::Mirroring;

pub const HEADER_SIZE: usize = 16;
pub const PRG_CHUNK_SIZE: usize = 0x4000;
pub const CHR_CHUNK_SIZE: usize = 0x2000;

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("cartridge image is {actual} bytes, expected {expected}")]
    Truncated { expected: usize, actual: usize },
    #[error("cartridge has no PRG chunks")]
    NoPrg,
    #[error("mapper {0} is not supported")]
    UnsupportedMapper(u8),
}

/// Parsed cartridge: header fields plus the raw PRG/CHR chunks, immutable
/// after construction. Mapper assembly consumes this by reference.
pub struct Cartridge {
    pub prg_count: usize,
    pub chr_count: usize,
    pub mapper: u8,
    pub mirroring: Mirroring,
    pub ignore_mirroring: bool,
    pub prg: Vec<Vec<u8>>,
    pub chr: Vec<Vec<u8>>,
}

impl Cartridge {
    /// Parse a self-describing image: header, then data.
    pub fn parse(bytes: &[u8]) -> Result<Self, CartridgeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CartridgeError::Truncated {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        let prg_count = bytes[4] as usize;
        let chr_count = bytes[5] as usize;
        let mapper = (bytes[6] >> 4) | (bytes[7] & 0xf0);
        let mirroring = if bytes[6] & 1 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let ignore_mirroring = bytes[6] & 0x08 != 0;
        Self::with_layout(prg_count, chr_count, mapper, mirroring, ignore_mirroring, bytes)
    }

    /// Parse an image whose header region is zero-filled, with the header
    /// fields supplied by the caller. The data layout is identical: chunks
    /// start right after the (blank) header region.
    pub fn parse_headerless(
        prg_count: usize,
        chr_count: usize,
        mapper: u8,
        mirroring: Mirroring,
        bytes: &[u8],
    ) -> Result<Self, CartridgeError> {
        Self::with_layout(prg_count, chr_count, mapper, mirroring, false, bytes)
    }

    fn with_layout(
        prg_count: usize,
        chr_count: usize,
        mapper: u8,
        mirroring: Mirroring,
        ignore_mirroring: bool,
        bytes: &[u8],
    ) -> Result<Self, CartridgeError> {
        let expected = HEADER_SIZE + prg_count * PRG_CHUNK_SIZE + chr_count * CHR_CHUNK_SIZE;
        if bytes.len() < expected {
            return Err(CartridgeError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }

        let mut offset = HEADER_SIZE;
        let mut prg = Vec::with_capacity(prg_count);
        for _ in 0..prg_count {
            prg.push(bytes[offset..offset + PRG_CHUNK_SIZE].to_vec());
            offset += PRG_CHUNK_SIZE;
        }
        let mut chr = Vec::with_capacity(chr_count);
        for _ in 0..chr_count {
            chr.push(bytes[offset..offset + CHR_CHUNK_SIZE].to_vec());
            offset += CHR_CHUNK_SIZE;
        }

        Ok(Cartridge {
            prg_count,
            chr_count,
            mapper,
            mirroring,
            ignore_mirroring,
            prg,
            chr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(prg_count: usize, chr_count: usize, flags6: u8, flags7: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_SIZE + prg_count * PRG_CHUNK_SIZE + chr_count * CHR_CHUNK_SIZE];
        bytes[4] = prg_count as u8;
        bytes[5] = chr_count as u8;
        bytes[6] = flags6;
        bytes[7] = flags7;
        for i in 0..prg_count {
            bytes[HEADER_SIZE + i * PRG_CHUNK_SIZE] = 0x10 + i as u8;
        }
        for i in 0..chr_count {
            bytes[HEADER_SIZE + prg_count * PRG_CHUNK_SIZE + i * CHR_CHUNK_SIZE] = 0x20 + i as u8;
        }
        bytes
    }

    #[test]
    fn header_fields_decode() {
        // Mapper 30 = 0x1E: low nibble 0xE in byte 6's high nibble, high
        // nibble 0x1 in byte 7's high nibble. Vertical + ignore-mirroring set.
        let bytes = image(2, 1, 0xe9, 0x10);
        let cartridge = Cartridge::parse(&bytes).unwrap();
        assert_eq!(cartridge.prg_count, 2);
        assert_eq!(cartridge.chr_count, 1);
        assert_eq!(cartridge.mapper, 30);
        assert!(matches!(cartridge.mirroring, Mirroring::Vertical));
        assert!(cartridge.ignore_mirroring);
        assert_eq!(cartridge.prg[0][0], 0x10);
        assert_eq!(cartridge.prg[1][0], 0x11);
        assert_eq!(cartridge.chr[0][0], 0x20);
    }

    #[test]
    fn truncated_images_are_rejected() {
        let bytes = image(2, 0, 0, 0);
        assert!(matches!(
            Cartridge::parse(&bytes[..bytes.len() - 1]),
            Err(CartridgeError::Truncated { .. })
        ));
        assert!(matches!(
            Cartridge::parse(&[0u8; 4]),
            Err(CartridgeError::Truncated { .. })
        ));
    }

    #[test]
    fn headerless_parse_takes_fields_from_the_caller() {
        let mut bytes = image(1, 1, 0xe9, 0x10);
        for byte in bytes.iter_mut().take(HEADER_SIZE) {
            *byte = 0;
        }
        let cartridge =
            Cartridge::parse_headerless(1, 1, 2, Mirroring::Horizontal, &bytes).unwrap();
        assert_eq!(cartridge.mapper, 2);
        assert!(matches!(cartridge.mirroring, Mirroring::Horizontal));
        assert!(!cartridge.ignore_mirroring);
        assert_eq!(cartridge.prg[0][0], 0x10);
    }
}
