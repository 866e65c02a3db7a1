//! The fixed 6144-byte file header: signatures, image pack attributes and
//! the IPI metadata block.

use std::io::Read;

use crate::error::{FormatError, Result, bail};
use crate::reader::{be_u16, be_u32};
use crate::scene::{SECTOR_SIZE, Scene};

/// Byte offset of the IPI metadata block (second sector).
const IPI_OFFSET: usize = SECTOR_SIZE;
/// Byte offset of the Base/16 image component attributes.
const ICA_OFFSET: usize = SECTOR_SIZE + 1536;
/// Total fixed header size: signature sector, IPI block, five ICA blocks.
pub(crate) const HEADER_LEN: usize = SECTOR_SIZE + 1536 + 5 * 512;

const IPI_SIGNATURE: &[u8] = b"PCD_IPI";
const OVERVIEW_SIGNATURE: &[u8] = b"PCD_OPA";
const SBA_SIGNATURE: &[u8] = b"SBA";

/// The parsed fixed header. The raw bytes are retained because the metadata
/// accessors read text fields straight out of the IPI block.
pub(crate) struct FileHeader {
    data: Vec<u8>,
    /// Original orientation code: 0, 90, 180 or 270 degrees CCW.
    pub(crate) rotation: u32,
    /// The largest scene encoded in the main file (Base, 4Base or 16Base).
    pub(crate) resolution: Scene,
    /// Whether the pack advertises a 64Base image pack extension.
    pub(crate) ipe_available: bool,
    /// Huffman compression class, 0-based (class 1 through 4).
    pub(crate) huffman_class: u8,
    /// Sector at which the 4Base component data ends; the 16Base tables
    /// and data are located relative to it.
    pub(crate) base4_stop: u32,
}

impl FileHeader {
    /// Read and validate the fixed header from the start of a pack file.
    pub(crate) fn parse<R: Read>(reader: &mut R) -> Result<FileHeader> {
        let mut data = vec![0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            match reader.read(&mut data[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        if filled < HEADER_LEN {
            bail!(FormatError::TooSmall);
        }

        if data.starts_with(OVERVIEW_SIGNATURE) {
            bail!(FormatError::OverviewFile);
        }
        if &data[IPI_OFFSET..IPI_OFFSET + 7] != IPI_SIGNATURE {
            bail!(FormatError::NotAPcdFile);
        }

        // Anything other than an interleave ratio of one means ADPCM audio
        // shares the track with the image data.
        if data[ICA_OFFSET + 9] != 1 {
            bail!(FormatError::InterleavedAudio);
        }

        let attributes = data[ICA_OFFSET + 2];
        let rotation = u32::from(attributes & 0x03);
        let resolution_code = usize::from((attributes >> 2) & 0x03).min(2);
        let resolution = Scene::from_index(Scene::Base as usize + resolution_code)
            .unwrap_or(Scene::Base16);
        let ipe_available = (attributes >> 4) & 0x01 != 0;
        let huffman_class = (attributes >> 5) & 0x03;
        let base4_stop = u32::from(be_u16(&data[ICA_OFFSET + 3..]));

        Ok(FileHeader {
            data,
            rotation,
            resolution,
            ipe_available,
            huffman_class,
            base4_stop,
        })
    }

    /// Sector offset of the 16Base Huffman code tables.
    pub(crate) fn hct_sector_16base(&self) -> usize {
        self.base4_stop as usize + 12
    }

    /// Sector offset of the 16Base image component data.
    pub(crate) fn icd_sector_16base(&self) -> usize {
        self.base4_stop as usize + 14
    }

    fn ipi(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[IPI_OFFSET + offset..IPI_OFFSET + offset + len]
    }

    pub(crate) fn specification_version(&self) -> [u8; 2] {
        [self.ipi(7, 2)[0], self.ipi(7, 2)[1]]
    }

    pub(crate) fn authoring_release(&self) -> [u8; 2] {
        [self.ipi(9, 2)[0], self.ipi(9, 2)[1]]
    }

    pub(crate) fn scanning_time(&self) -> u32 {
        be_u32(self.ipi(13, 4))
    }

    pub(crate) fn modification_time(&self) -> u32 {
        be_u32(self.ipi(17, 4))
    }

    pub(crate) fn medium(&self) -> u8 {
        self.ipi(21, 1)[0]
    }

    pub(crate) fn product_type(&self) -> &[u8] {
        self.ipi(22, 20)
    }

    pub(crate) fn scanner_vendor(&self) -> &[u8] {
        self.ipi(42, 20)
    }

    pub(crate) fn scanner_product(&self) -> &[u8] {
        self.ipi(62, 16)
    }

    pub(crate) fn scanner_firmware_revision(&self) -> &[u8] {
        self.ipi(78, 4)
    }

    pub(crate) fn scanner_firmware_date(&self) -> &[u8] {
        self.ipi(82, 8)
    }

    pub(crate) fn scanner_serial(&self) -> &[u8] {
        self.ipi(90, 20)
    }

    pub(crate) fn scanner_pixel_size(&self) -> [u8; 2] {
        [self.ipi(110, 2)[0], self.ipi(110, 2)[1]]
    }

    pub(crate) fn piw_manufacturer(&self) -> &[u8] {
        self.ipi(112, 20)
    }

    pub(crate) fn finisher_char_set(&self) -> u8 {
        self.ipi(132, 1)[0]
    }

    pub(crate) fn finisher_name(&self) -> &[u8] {
        self.ipi(165, 60)
    }

    pub(crate) fn has_sba(&self) -> bool {
        self.ipi(225, 3) == SBA_SIGNATURE
    }

    pub(crate) fn sba_revision(&self) -> [u8; 2] {
        [self.ipi(228, 2)[0], self.ipi(228, 2)[1]]
    }

    pub(crate) fn sba_command(&self) -> u8 {
        self.ipi(230, 1)[0]
    }

    pub(crate) fn sba_ftn(&self) -> u16 {
        be_u16(self.ipi(325, 2))
    }

    pub(crate) fn copyright_status(&self) -> u8 {
        self.ipi(331, 1)[0]
    }

    pub(crate) fn copyright_file(&self) -> &[u8] {
        self.ipi(332, 12)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::DecodeError;

    /// A minimal valid header: IPI signature, interleave ratio 1, and the
    /// given attribute byte.
    pub(crate) fn synthetic_header(attributes: u8) -> Vec<u8> {
        let mut data = vec![0u8; HEADER_LEN];
        data[..7].copy_from_slice(b"PCD_IPI");
        data[IPI_OFFSET..IPI_OFFSET + 7].copy_from_slice(b"PCD_IPI");
        data[ICA_OFFSET + 2] = attributes;
        data[ICA_OFFSET + 9] = 1;
        data
    }

    #[test]
    fn parses_attributes() {
        // Rotation 1, resolution code 2 (16Base), IPE available, class 2.
        let attributes = 0b0011_1001;
        let header = FileHeader::parse(&mut synthetic_header(attributes).as_slice()).unwrap();
        assert_eq!(header.rotation, 1);
        assert_eq!(header.resolution, Scene::Base16);
        assert!(header.ipe_available);
        assert_eq!(header.huffman_class, 1);
    }

    #[test]
    fn rejects_overview_files() {
        let mut data = synthetic_header(0);
        data[..7].copy_from_slice(b"PCD_OPA");
        match FileHeader::parse(&mut data.as_slice()) {
            Err(DecodeError::Format(FormatError::OverviewFile)) => {}
            Err(other) => panic!("expected OverviewFile, got {other:?}"),
            Ok(_) => panic!("expected OverviewFile, got a header"),
        }
    }

    #[test]
    fn rejects_foreign_files() {
        let mut data = synthetic_header(0);
        data[IPI_OFFSET] = b'X';
        match FileHeader::parse(&mut data.as_slice()) {
            Err(DecodeError::Format(FormatError::NotAPcdFile)) => {}
            Err(other) => panic!("expected NotAPcdFile, got {other:?}"),
            Ok(_) => panic!("expected NotAPcdFile, got a header"),
        }
    }

    #[test]
    fn rejects_truncated_files() {
        let data = vec![0u8; HEADER_LEN - 1];
        match FileHeader::parse(&mut data.as_slice()) {
            Err(DecodeError::Format(FormatError::TooSmall)) => {}
            Err(other) => panic!("expected TooSmall, got {other:?}"),
            Ok(_) => panic!("expected TooSmall, got a header"),
        }
    }

    #[test]
    fn rejects_interleaved_audio() {
        let mut data = synthetic_header(0);
        data[ICA_OFFSET + 9] = 2;
        match FileHeader::parse(&mut data.as_slice()) {
            Err(DecodeError::Format(FormatError::InterleavedAudio)) => {}
            Err(other) => panic!("expected InterleavedAudio, got {other:?}"),
            Ok(_) => panic!("expected InterleavedAudio, got a header"),
        }
    }
}
