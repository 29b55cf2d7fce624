//! Compound File Binary (OLE2) inspection
//!
//! Legacy Word, Excel and PowerPoint files share the CFB container, so the
//! signature alone cannot tell them apart. `classify` walks the header, the
//! FAT and the directory chain and decides by the stream names present.
//!
//! Only what classification needs is parsed. Mini streams, stream contents
//! and the red-black tree layout of the directory are ignored.

use super::{DetectedKind, UploadError};

const HEADER_SIZE: usize = 512;
const DIR_ENTRY_SIZE: usize = 128;
const HEADER_DIFAT_ENTRIES: usize = 109;

const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
const FREESECT: u32 = 0xFFFF_FFFF;
const MAXREGSECT: u32 = 0xFFFF_FFFA;

const OBJECT_STREAM: u8 = 2;

fn read_u16(bytes: &[u8], offset: usize) -> Result<u16, UploadError> {
    bytes
        .get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| malformed(format!("truncated at offset {}", offset)))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, UploadError> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| malformed(format!("truncated at offset {}", offset)))
}

fn malformed(msg: impl Into<String>) -> UploadError {
    UploadError::Malformed(format!("compound file: {}", msg.into()))
}

/// Parsed container view over the raw bytes
struct CompoundFile<'a> {
    bytes: &'a [u8],
    sector_size: usize,
    fat: Vec<u32>,
    first_dir_sector: u32,
    /// Declared directory sector count; zero in version 3 files
    num_dir_sectors: usize,
}

impl<'a> CompoundFile<'a> {
    fn parse(bytes: &'a [u8]) -> Result<Self, UploadError> {
        if bytes.len() < HEADER_SIZE {
            return Err(malformed("shorter than header"));
        }

        if read_u16(bytes, 0x1C)? != 0xFFFE {
            return Err(malformed("bad byte order mark"));
        }

        let sector_shift = read_u16(bytes, 0x1E)?;
        let sector_size = match sector_shift {
            9 => 512,
            12 => 4096,
            other => return Err(malformed(format!("unsupported sector shift {}", other))),
        };

        let num_dir_sectors = read_u32(bytes, 0x28)? as usize;
        let num_fat_sectors = read_u32(bytes, 0x2C)? as usize;
        let first_dir_sector = read_u32(bytes, 0x30)?;
        let first_difat_sector = read_u32(bytes, 0x44)?;
        let num_difat_sectors = read_u32(bytes, 0x48)? as usize;

        let mut file = CompoundFile {
            bytes,
            sector_size,
            fat: Vec::new(),
            first_dir_sector,
            num_dir_sectors,
        };

        let fat_sectors =
            file.fat_sector_locations(num_fat_sectors, first_difat_sector, num_difat_sectors)?;

        let entries_per_sector = sector_size / 4;
        let mut fat = Vec::with_capacity(fat_sectors.len() * entries_per_sector);
        for sector in fat_sectors {
            let data = file.sector(sector)?;
            for i in 0..entries_per_sector {
                fat.push(read_u32(data, i * 4)?);
            }
        }
        file.fat = fat;

        Ok(file)
    }

    fn sector_count(&self) -> usize {
        // Header occupies the first sector-sized slot
        (self.bytes.len() / self.sector_size).saturating_sub(1)
    }

    /// Sector `n` starts right after the header-sized first sector
    fn sector(&self, n: u32) -> Result<&'a [u8], UploadError> {
        if n > MAXREGSECT {
            return Err(malformed(format!("sector {:#x} is not a regular sector", n)));
        }

        let start = (n as usize + 1)
            .checked_mul(self.sector_size)
            .ok_or_else(|| malformed("sector offset overflow"))?;
        let end = start + self.sector_size;

        self.bytes
            .get(start..end)
            .ok_or_else(|| malformed(format!("sector {} out of range", n)))
    }

    /// FAT sector numbers: first 109 from the header, the rest from the DIFAT chain
    fn fat_sector_locations(
        &self,
        num_fat_sectors: usize,
        first_difat_sector: u32,
        num_difat_sectors: usize,
    ) -> Result<Vec<u32>, UploadError> {
        if num_fat_sectors == 0 {
            return Err(malformed("no FAT sectors"));
        }
        if num_fat_sectors > self.sector_count().max(1) {
            return Err(malformed("FAT sector count exceeds file size"));
        }

        let mut locations = Vec::with_capacity(num_fat_sectors);

        for i in 0..HEADER_DIFAT_ENTRIES.min(num_fat_sectors) {
            locations.push(read_u32(self.bytes, 0x4C + i * 4)?);
        }

        let per_difat = self.sector_size / 4 - 1;
        let mut difat_sector = first_difat_sector;
        let mut visited = 0;

        while locations.len() < num_fat_sectors {
            if difat_sector == ENDOFCHAIN || difat_sector == FREESECT {
                return Err(malformed("DIFAT chain ended early"));
            }
            visited += 1;
            if visited > num_difat_sectors.max(1) {
                return Err(malformed("DIFAT chain longer than declared"));
            }

            let data = self.sector(difat_sector)?;
            for i in 0..per_difat {
                if locations.len() == num_fat_sectors {
                    break;
                }
                locations.push(read_u32(data, i * 4)?);
            }
            difat_sector = read_u32(data, per_difat * 4)?;
        }

        Ok(locations)
    }

    /// Follow the FAT chain from `start` for at most `max_len` sectors
    ///
    /// Every link must name a sector inside the file, so a chain can never
    /// outgrow the file itself.
    fn chain(&self, start: u32, max_len: usize) -> Result<Vec<u32>, UploadError> {
        let max_len = max_len.min(self.sector_count());
        let mut sectors = Vec::new();
        let mut current = start;

        while current != ENDOFCHAIN {
            if sectors.len() >= max_len {
                return Err(malformed("sector chain longer than its stream"));
            }
            if current as usize >= self.sector_count() {
                return Err(malformed(format!("sector {} out of range", current)));
            }
            let next = *self
                .fat
                .get(current as usize)
                .ok_or_else(|| malformed(format!("sector {} outside FAT", current)))?;
            sectors.push(current);
            current = next;
        }

        if sectors.is_empty() {
            return Err(malformed("empty directory chain"));
        }

        Ok(sectors)
    }

    /// Names of every stream object in the directory
    fn stream_names(&self) -> Result<Vec<String>, UploadError> {
        let mut names = Vec::new();

        let max_len = match self.num_dir_sectors {
            0 => self.sector_count(),
            declared => declared,
        };

        for sector in self.chain(self.first_dir_sector, max_len)? {
            let data = self.sector(sector)?;

            for entry in data.chunks_exact(DIR_ENTRY_SIZE) {
                if entry[0x42] != OBJECT_STREAM {
                    continue;
                }

                // Length in bytes including the UTF-16 NUL terminator
                let name_len = read_u16(entry, 0x40)? as usize;
                if !(2..=64).contains(&name_len) || name_len % 2 != 0 {
                    continue;
                }

                let units: Vec<u16> = entry[..name_len - 2]
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                names.push(String::from_utf16_lossy(&units));
            }
        }

        Ok(names)
    }
}

/// Classify a CFB container as DOC, XLS or PPT
pub fn classify(bytes: &[u8]) -> Result<DetectedKind, UploadError> {
    let file = CompoundFile::parse(bytes)?;
    let names = file.stream_names()?;

    let has = |wanted: &str| names.iter().any(|n| n == wanted);

    if has("WordDocument") {
        Ok(DetectedKind::Doc)
    } else if has("Workbook") || has("Book") {
        Ok(DetectedKind::Xls)
    } else if has("PowerPoint Document") {
        Ok(DetectedKind::Ppt)
    } else {
        tracing::debug!(streams = ?names, "Compound file without Office streams");
        Err(UploadError::UnsupportedType("application/x-cfb".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn dir_entry(name: &str, object_type: u8) -> [u8; DIR_ENTRY_SIZE] {
        let mut entry = [0u8; DIR_ENTRY_SIZE];
        let units: Vec<u16> = name.encode_utf16().collect();
        for (i, unit) in units.iter().enumerate() {
            entry[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        let name_len = ((units.len() + 1) * 2) as u16;
        entry[0x40..0x42].copy_from_slice(&name_len.to_le_bytes());
        entry[0x42] = object_type;
        entry
    }

    /// Version 3 container: header, one FAT sector (0), one directory sector (1)
    pub(crate) fn synthetic_cfb(stream_name: &str) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_SIZE * 3];

        bytes[..8].copy_from_slice(&super::super::CFB_SIGNATURE);
        bytes[0x18..0x1A].copy_from_slice(&0x003Eu16.to_le_bytes());
        bytes[0x1A..0x1C].copy_from_slice(&3u16.to_le_bytes());
        bytes[0x1C..0x1E].copy_from_slice(&0xFFFEu16.to_le_bytes());
        bytes[0x1E..0x20].copy_from_slice(&9u16.to_le_bytes());
        bytes[0x20..0x22].copy_from_slice(&6u16.to_le_bytes());
        bytes[0x2C..0x30].copy_from_slice(&1u32.to_le_bytes());
        bytes[0x30..0x34].copy_from_slice(&1u32.to_le_bytes());
        bytes[0x44..0x48].copy_from_slice(&ENDOFCHAIN.to_le_bytes());
        for i in 0..HEADER_DIFAT_ENTRIES {
            let value = if i == 0 { 0u32 } else { FREESECT };
            bytes[0x4C + i * 4..0x50 + i * 4].copy_from_slice(&value.to_le_bytes());
        }

        // FAT sector
        let fat = &mut bytes[HEADER_SIZE..HEADER_SIZE * 2];
        for i in 0..128 {
            let value = match i {
                0 => 0xFFFF_FFFD,
                1 => ENDOFCHAIN,
                _ => FREESECT,
            };
            fat[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }

        // Directory sector
        let dir = &mut bytes[HEADER_SIZE * 2..];
        dir[..DIR_ENTRY_SIZE].copy_from_slice(&dir_entry("Root Entry", 5));
        dir[DIR_ENTRY_SIZE..DIR_ENTRY_SIZE * 2]
            .copy_from_slice(&dir_entry(stream_name, OBJECT_STREAM));

        bytes
    }

    #[test]
    fn test_classify_each_office_format() {
        assert_eq!(classify(&synthetic_cfb("WordDocument")).unwrap(), DetectedKind::Doc);
        assert_eq!(classify(&synthetic_cfb("Workbook")).unwrap(), DetectedKind::Xls);
        assert_eq!(classify(&synthetic_cfb("Book")).unwrap(), DetectedKind::Xls);
        assert_eq!(
            classify(&synthetic_cfb("PowerPoint Document")).unwrap(),
            DetectedKind::Ppt
        );
    }

    #[test]
    fn test_unknown_streams_unsupported() {
        let result = classify(&synthetic_cfb("Contents"));
        assert!(matches!(result, Err(UploadError::UnsupportedType(_))));
    }

    #[test]
    fn test_truncated_header_malformed() {
        let bytes = synthetic_cfb("WordDocument");
        assert!(matches!(
            classify(&bytes[..100]),
            Err(UploadError::Malformed(_))
        ));
    }

    #[test]
    fn test_directory_sector_out_of_range() {
        let mut bytes = synthetic_cfb("WordDocument");
        // Directory chain starts at a sector past end of file
        bytes[0x30..0x34].copy_from_slice(&40u32.to_le_bytes());
        assert!(matches!(classify(&bytes), Err(UploadError::Malformed(_))));
    }

    #[test]
    fn test_fat_cycle_detected() {
        let mut bytes = synthetic_cfb("WordDocument");
        // FAT[1] -> 1
        bytes[HEADER_SIZE + 4..HEADER_SIZE + 8].copy_from_slice(&1u32.to_le_bytes());
        assert!(matches!(classify(&bytes), Err(UploadError::Malformed(_))));
    }

    #[test]
    fn test_directory_chain_capped_at_declared_length() {
        let mut bytes = synthetic_cfb("WordDocument");
        // Directory chain 1 -> 0 spans two sectors but declares one
        bytes[HEADER_SIZE + 4..HEADER_SIZE + 8].copy_from_slice(&0u32.to_le_bytes());
        bytes[HEADER_SIZE..HEADER_SIZE + 4].copy_from_slice(&ENDOFCHAIN.to_le_bytes());
        bytes[0x28..0x2C].copy_from_slice(&1u32.to_le_bytes());

        let file = CompoundFile::parse(&bytes).unwrap();
        assert_eq!(file.chain(1, 2).unwrap(), vec![1, 0]);
        assert!(matches!(file.stream_names(), Err(UploadError::Malformed(_))));
    }

    #[test]
    fn test_chain_link_past_end_of_file() {
        let mut bytes = synthetic_cfb("WordDocument");
        // FAT[1] -> 100, a valid FAT index with no sector behind it
        bytes[HEADER_SIZE + 4..HEADER_SIZE + 8].copy_from_slice(&100u32.to_le_bytes());
        let file = CompoundFile::parse(&bytes).unwrap();
        assert!(matches!(file.chain(1, usize::MAX), Err(UploadError::Malformed(_))));
    }

    #[test]
    fn test_bad_sector_shift() {
        let mut bytes = synthetic_cfb("WordDocument");
        bytes[0x1E..0x20].copy_from_slice(&10u16.to_le_bytes());
        assert!(matches!(classify(&bytes), Err(UploadError::Malformed(_))));
    }
}
