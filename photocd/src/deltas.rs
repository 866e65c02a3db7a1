//! Parsing the Huffman-coded residual streams of the 4Base, 16Base and
//! 64Base levels.
//!
//! A stream is a series of sequences, each introduced by a 24-bit
//! `0xFFFFFE` preamble followed by a packed header word carrying the
//! destination plane, row and sequence index. Field positions inside that
//! word differ per scene; the tables in [`crate::scene`] hold the shifts
//! and masks.

use std::io::Read;

use crate::bitstream::BitSource;
use crate::error::{Result, StreamError, bail};
use crate::huffman::{self, HuffTable};
use crate::scene::{
    CHROMA_HEIGHT, CHROMA_WIDTH, HUFFMAN_HEADER_SIZE, LUMA_HEIGHT, LUMA_WIDTH, PLANE_MASK,
    PLANE_SHIFT, ROW_MASK, ROW_SHIFT, ROW_SUBSAMPLE, SEQUENCE_MASK, SEQUENCE_SHIFT, Scene,
};

/// Destination residual planes for one layer. A missing plane means its
/// sequences are skipped; the resynchroniser walks over their bodies.
#[derive(Default)]
pub(crate) struct DeltaPlanes<'a> {
    pub(crate) luma: Option<&'a mut [u8]>,
    pub(crate) chroma1: Option<&'a mut [u8]>,
    pub(crate) chroma2: Option<&'a mut [u8]>,
}

/// Decode residual sequences into `planes`.
///
/// `sequence_size` of zero means one sequence per plane row; the 64Base
/// extension files instead carry fixed-length sequences that tile a row.
/// `max_sequences` of zero means "run until every plane has been seen and
/// the stream signals an out-of-range row"; the 64Base pointer table
/// instead dictates an exact count per extension-file run. `col_offset`
/// shifts luma destinations horizontally (and chroma by half of it) for
/// 64Base tiles of non-native aspect ratio.
pub(crate) fn read_deltas<R: Read>(
    bits: &mut BitSource<R>,
    tables: &[HuffTable; 3],
    scene: Scene,
    sequence_size: usize,
    max_sequences: usize,
    planes: &mut DeltaPlanes<'_>,
    col_offset: usize,
) -> Result<()> {
    let s = scene as usize;
    let luma_width = LUMA_WIDTH[s];
    let luma_height = LUMA_HEIGHT[s];
    let chroma_width = CHROMA_WIDTH[s];

    let mut plane_track = planes.luma.is_some() as u8
        | (planes.chroma1.is_some() as u8) << 1
        | (planes.chroma2.is_some() as u8) << 2;

    let mut remaining = if max_sequences == 0 {
        if scene == Scene::Base64 {
            1
        } else {
            luma_height + 2 * CHROMA_HEIGHT[s]
        }
    } else {
        max_sequences
    };

    let mut row = 0;
    while (plane_track != 0 || row < luma_height) && remaining > 0 {
        bits.resync()?;
        // Slide past the marker so the register holds the packed header.
        bits.consume(16)?;
        let sum = bits.sum();
        row = ((sum >> ROW_SHIFT[s]) & ROW_MASK[s]) as usize;
        let sequence = ((sum >> SEQUENCE_SHIFT[s]) & SEQUENCE_MASK[s]) as usize;
        let plane = (sum >> PLANE_SHIFT[s]) & PLANE_MASK[s];
        // 64Base chroma preambles address rows at chroma resolution.
        if plane != 0 {
            row *= ROW_SUBSAMPLE[s];
        }
        for _ in 0..HUFFMAN_HEADER_SIZE[s] {
            bits.consume(8)?;
        }

        if row < luma_height {
            match plane {
                0 => {
                    let length = if sequence_size == 0 { luma_width } else { sequence_size };
                    let start = row * luma_width + sequence * sequence_size + col_offset;
                    if let Some(luma) = planes.luma.as_deref_mut() {
                        let dest = luma
                            .get_mut(start..start + length)
                            .ok_or(StreamError::OutOfRange)?;
                        huffman::decode_run(bits, &tables[0], dest)?;
                    }
                    plane_track &= 0x6;
                }
                2 => {
                    let length =
                        if sequence_size == 0 { chroma_width } else { sequence_size };
                    let start =
                        (row >> 1) * chroma_width + sequence * sequence_size + (col_offset >> 1);
                    if let Some(chroma1) = planes.chroma1.as_deref_mut() {
                        let dest = chroma1
                            .get_mut(start..start + length)
                            .ok_or(StreamError::OutOfRange)?;
                        huffman::decode_run(bits, &tables[1], dest)?;
                    }
                    plane_track &= 0x5;
                }
                // Some encoders label the second chroma plane 4 instead of
                // 3 in extension files; accept both.
                3 | 4 => {
                    let length =
                        if sequence_size == 0 { chroma_width } else { sequence_size };
                    let start =
                        (row >> 1) * chroma_width + sequence * sequence_size + (col_offset >> 1);
                    if let Some(chroma2) = planes.chroma2.as_deref_mut() {
                        let dest = chroma2
                            .get_mut(start..start + length)
                            .ok_or(StreamError::OutOfRange)?;
                        huffman::decode_run(bits, &tables[2], dest)?;
                    }
                    plane_track &= 0x3;
                }
                _ => bail!(StreamError::CorruptImage),
            }
        } else {
            ldebug!("skipping sequence for out-of-range row {}", row);
        }
        remaining -= 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;
    use std::io::Cursor;

    /// A single-symbol code: every bit decodes key 0 in one step.
    fn zero_tables() -> [HuffTable; 3] {
        let record = [0u8, 0, 0x00, 0x00, 0];
        huffman::read_tables(&record, 1).unwrap()
    }

    /// Assemble a 4Base preamble for `plane` and `row`: three marker
    /// bytes, then sixteen header bits.
    fn preamble_4base(stream: &mut Vec<u8>, plane: u32, row: u32) {
        stream.extend_from_slice(&[0xff, 0xff, 0xfe]);
        stream.push(((plane << 6) | (row >> 7)) as u8);
        stream.push(((row & 0x7f) << 1) as u8);
    }

    fn luma_row_bytes(scene: Scene) -> usize {
        // One bit per pixel with the single-symbol code.
        scene.luma_width() / 8
    }

    #[test]
    fn whole_rows_and_terminator() {
        let scene = Scene::Base4;
        let mut stream = Vec::new();
        for row in 0..scene.luma_height() as u32 {
            preamble_4base(&mut stream, 0, row);
            stream.extend(std::iter::repeat_n(0u8, luma_row_bytes(scene)));
        }
        // Terminator sequence: a row one past the end.
        preamble_4base(&mut stream, 0, scene.luma_height() as u32);
        stream.extend_from_slice(&[0; 16]);

        let mut luma = vec![0xffu8; scene.luma_area()];
        let mut planes = DeltaPlanes { luma: Some(&mut luma), ..Default::default() };
        let mut bits = BitSource::new(Cursor::new(stream)).unwrap();
        read_deltas(&mut bits, &zero_tables(), scene, 0, 0, &mut planes, 0).unwrap();
        assert!(luma.iter().all(|&b| b == 0));
    }

    #[test]
    fn unknown_plane_is_corrupt() {
        let scene = Scene::Base4;
        let mut stream = Vec::new();
        preamble_4base(&mut stream, 1, 0);
        stream.extend_from_slice(&[0; 32]);

        let mut luma = vec![0u8; scene.luma_area()];
        let mut planes = DeltaPlanes { luma: Some(&mut luma), ..Default::default() };
        let mut bits = BitSource::new(Cursor::new(stream)).unwrap();
        let result = read_deltas(&mut bits, &zero_tables(), scene, 0, 0, &mut planes, 0);
        match result {
            Err(crate::error::DecodeError::Stream(StreamError::CorruptImage)) => {}
            other => panic!("expected CorruptImage, got {other:?}"),
        }
    }

    #[test]
    fn out_of_range_rows_are_skipped() {
        let scene = Scene::Base4;
        let mut stream = Vec::new();
        // A bogus over-range row, then the real terminator; no plane was
        // requested, so the parser only needs to see the terminator row.
        preamble_4base(&mut stream, 0, scene.luma_height() as u32 + 7);
        preamble_4base(&mut stream, 0, scene.luma_height() as u32);
        stream.extend_from_slice(&[0; 16]);

        let mut planes = DeltaPlanes::default();
        let mut bits = BitSource::new(Cursor::new(stream)).unwrap();
        read_deltas(&mut bits, &zero_tables(), scene, 0, 0, &mut planes, 0).unwrap();
    }
}
