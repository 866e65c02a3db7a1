//! The 64Base image pack extension: the IC sidecar file and the extension
//! files its pointer table indexes.
//!
//! The sidecar is small enough to hold in memory whole. Its header points
//! at four sub-blocks: the layer descriptors, an 8.3 filename table, a
//! per-sequence pointer table of `(file index, byte offset)` records, and
//! the Huffman code tables. Contiguous pointer-table records sharing a
//! file index form a run that is decoded from one extension file in a
//! single pass.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use smallvec::SmallVec;

use crate::bitstream::BitSource;
use crate::deltas::{self, DeltaPlanes};
use crate::error::{IpeError, Result, StreamError, bail};
use crate::huffman;
use crate::reader::{ByteReader, be_u16, be_u32, trimmed_text};
use crate::scene::Scene;

/// The decoded residual planes of the 64Base level. Chroma planes exist
/// only when the sidecar carries three layers.
pub(crate) struct IpeImage {
    pub(crate) luma: Vec<u8>,
    pub(crate) chroma1: Option<Vec<u8>>,
    pub(crate) chroma2: Option<Vec<u8>>,
}

struct LayerDescriptor {
    width: usize,
    height: usize,
    /// Column offset of this tile inside the full plane, for packs whose
    /// aspect ratio does not fill the native 64Base frame.
    col_offset: usize,
    /// Length in bytes of one residual sequence.
    sequence_len: usize,
    pointer_offset: usize,
}

/// Parse the IC sidecar at `path` and decode every extension-file run into
/// fresh 64Base residual planes. `monochrome` restricts decoding to the
/// luma layer even when the sidecar carries chroma.
pub(crate) fn parse_ipe(path: &Path, monochrome: bool) -> Result<IpeImage> {
    let path_text = path.to_string_lossy().into_owned();
    if path_text.len() < 10 {
        bail!(IpeError::PathTooShort);
    }
    // The case of the "64BASE" path component tells us whether the disc
    // was mounted with upper- or lower-case names.
    let lower_case = path_text.as_bytes()[path_text.len() - 9] == b'e';

    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(_) => bail!(IpeError::Unreadable),
    };

    let mut header = ByteReader::at(&data, 0x28);
    header.skip(4).ok_or(IpeError::TooSmall)?; // two reserved words
    let descriptor_offset = header.read_u32().ok_or(IpeError::TooSmall)? as usize;
    let filename_offset = header.read_u32().ok_or(IpeError::TooSmall)? as usize;
    let _pointer_offset = header.read_u32().ok_or(IpeError::TooSmall)?;
    let huffman_offset = header.read_u32().ok_or(IpeError::TooSmall)? as usize;

    let mut layers = ByteReader::at(&data, descriptor_offset)
        .read_u16()
        .ok_or(IpeError::TooSmall)?;
    if layers != 1 && layers != 3 {
        bail!(IpeError::InvalidLayerCount);
    }
    if monochrome {
        layers = 1;
    }

    let descriptors = read_descriptors(&data, descriptor_offset + 2, layers)?;
    let names = read_filenames(&data, filename_offset, layers, lower_case)?;

    let table_block = data
        .get(huffman_offset..)
        .ok_or(IpeError::TooSmall)?;
    let table_block =
        &table_block[..huffman::table_block_len(layers as usize).min(table_block.len())];
    let tables = huffman::read_tables(table_block, layers as usize)?;

    let scene = Scene::Base64;
    let mut image = IpeImage {
        luma: vec![0; scene.luma_area()],
        chroma1: (layers == 3).then(|| vec![0; scene.chroma_area()]),
        chroma2: (layers == 3).then(|| vec![0; scene.chroma_area()]),
    };

    for descriptor in &descriptors {
        if descriptor.sequence_len == 0 {
            bail!(StreamError::CorruptImage);
        }
        let sequences = descriptor.width * descriptor.height / descriptor.sequence_len;
        decode_layer(
            &data,
            descriptor,
            sequences,
            &tables,
            &names,
            &path_text,
            &mut image,
        )?;
    }

    Ok(image)
}

fn read_descriptors(data: &[u8], start: usize, layers: u16) -> Result<SmallVec<[LayerDescriptor; 3]>> {
    let mut descriptors = SmallVec::new();
    let mut offset = start;
    for _ in 0..layers {
        let block = data.get(offset..offset + 22).ok_or(IpeError::TooSmall)?;
        let mut reader = ByteReader::new(block);
        let len = reader.read_u16().ok_or(IpeError::TooSmall)? as usize;
        reader.skip(2).ok_or(IpeError::TooSmall)?; // color class and fill
        let width = reader.read_u16().ok_or(IpeError::TooSmall)? as usize;
        let height = reader.read_u16().ok_or(IpeError::TooSmall)? as usize;
        let col_offset = reader.read_u16().ok_or(IpeError::TooSmall)? as usize;
        let sequence_len = reader.read_u32().ok_or(IpeError::TooSmall)? as usize;
        let pointer_offset = reader.read_u32().ok_or(IpeError::TooSmall)? as usize;
        descriptors.push(LayerDescriptor {
            width,
            height,
            col_offset,
            sequence_len,
            pointer_offset,
        });
        offset += len;
    }
    Ok(descriptors)
}

fn read_filenames(
    data: &[u8],
    start: usize,
    layers: u16,
    lower_case: bool,
) -> Result<SmallVec<[String; 10]>> {
    let count = ByteReader::at(data, start)
        .read_u16()
        .ok_or(IpeError::TooSmall)?;
    if count < 1 || count > 10 || count < layers {
        bail!(IpeError::InvalidFileCount);
    }

    let mut names = SmallVec::new();
    for index in 0..count as usize {
        // Each record is the 12-character name plus a 32-bit file size.
        let offset = start + 2 + index * 16;
        let field = data.get(offset..offset + 12).ok_or(IpeError::TooSmall)?;
        let mut name = trimmed_text(field);
        if lower_case {
            name.make_ascii_lowercase();
        }
        names.push(name);
    }
    Ok(names)
}

fn decode_layer(
    data: &[u8],
    descriptor: &LayerDescriptor,
    sequences: usize,
    tables: &[huffman::HuffTable; 3],
    names: &SmallVec<[String; 10]>,
    ipe_path: &str,
    image: &mut IpeImage,
) -> Result<()> {
    let entries = data
        .get(descriptor.pointer_offset..descriptor.pointer_offset + sequences * 6)
        .ok_or(IpeError::TooSmall)?;

    let mut index = 0;
    while index < sequences {
        let run_file = be_u16(&entries[index * 6..]);
        let run_offset = be_u32(&entries[index * 6 + 2..]);
        let mut run_len = 1;
        while index + run_len < sequences && be_u16(&entries[(index + run_len) * 6..]) == run_file
        {
            run_len += 1;
        }

        let name = names
            .get(usize::from(run_file))
            .ok_or(IpeError::InvalidFileCount)?;
        let mut file = match File::open(extension_path(ipe_path, name)) {
            Ok(file) => file,
            Err(_) => bail!(IpeError::ExtensionUnreadable),
        };
        file.seek(SeekFrom::Start(u64::from(run_offset)))?;

        let mut bits = BitSource::new(&mut file)?;
        let mut planes = DeltaPlanes {
            luma: Some(&mut image.luma),
            chroma1: image.chroma1.as_deref_mut(),
            chroma2: image.chroma2.as_deref_mut(),
        };
        deltas::read_deltas(
            &mut bits,
            tables,
            Scene::Base64,
            descriptor.sequence_len,
            run_len,
            &mut planes,
            descriptor.col_offset,
        )?;

        index += run_len;
    }
    Ok(())
}

/// Extension files sit next to the sidecar: the final 7 characters of the
/// sidecar path are its 8.3 stem, which gets replaced by the table entry.
fn extension_path(ipe_path: &str, name: &str) -> PathBuf {
    let mut path = ipe_path[..ipe_path.len() - 7].to_string();
    path.push_str(name);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_paths_replace_the_stem() {
        assert_eq!(
            extension_path("/cd/photo_cd/64base/img0001", "img0001.16b"),
            PathBuf::from("/cd/photo_cd/64base/img0001.16b")
        );
    }

    #[test]
    fn short_paths_are_rejected() {
        match parse_ipe(Path::new("x"), false) {
            Err(crate::error::DecodeError::Ipe(IpeError::PathTooShort)) => {}
            Err(other) => panic!("expected PathTooShort, got {other:?}"),
            Ok(_) => panic!("expected PathTooShort, got an image"),
        }
    }

    #[test]
    fn missing_sidecar_is_unreadable() {
        match parse_ipe(Path::new("/nonexistent/64base/img0001"), false) {
            Err(crate::error::DecodeError::Ipe(IpeError::Unreadable)) => {}
            Err(other) => panic!("expected Unreadable, got {other:?}"),
            Ok(_) => panic!("expected Unreadable, got an image"),
        }
    }
}
