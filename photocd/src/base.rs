//! Loading the uncompressed Base (and smaller) images.
//!
//! The three lowest levels are stored as plain interleaved rows: two luma
//! rows, then one row of each chroma plane, repeated down the image.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{FormatError, Result, bail};
use crate::scene::{ICD_SECTOR, SECTOR_SIZE, Scene};

/// The planes of a successfully loaded base image.
pub(crate) struct BaseImage {
    /// The level that was actually read; at most [`Scene::Base`], and lower
    /// than requested when the file is truncated.
    pub(crate) scene: Scene,
    pub(crate) luma: Vec<u8>,
    pub(crate) chroma1: Vec<u8>,
    pub(crate) chroma2: Vec<u8>,
}

/// Read the base image for `scene`, demoting level by level on truncated
/// data. Fails only when not even the Base/16 thumbnail can be read.
pub(crate) fn read_base_image<R: Read + Seek>(reader: &mut R, scene: Scene) -> Result<BaseImage> {
    let mut scene = scene.min(Scene::Base);

    loop {
        match read_plain_scene(reader, scene) {
            Ok((luma, chroma1, chroma2)) => {
                return Ok(BaseImage { scene, luma, chroma1, chroma2 });
            }
            Err(error) => {
                ldebug!("base image read failed at {:?}: {}", scene, error);
                match scene.prev() {
                    Some(smaller) => scene = smaller,
                    None => bail!(FormatError::NoValidBaseImage),
                }
            }
        }
    }
}

fn read_plain_scene<R: Read + Seek>(
    reader: &mut R,
    scene: Scene,
) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
    let luma_width = scene.luma_width();
    let chroma_width = scene.chroma_width();

    let mut luma = vec![0u8; scene.luma_area()];
    let mut chroma1 = vec![0u8; scene.chroma_area()];
    let mut chroma2 = vec![0u8; scene.chroma_area()];

    reader.seek(SeekFrom::Start(
        (SECTOR_SIZE * ICD_SECTOR[scene as usize]) as u64,
    ))?;

    let mut count = 0;
    for y in 0..scene.chroma_height() {
        count += read_some(reader, &mut luma[y * 2 * luma_width..][..luma_width])?;
        count += read_some(reader, &mut luma[(y * 2 + 1) * luma_width..][..luma_width])?;
        count += read_some(reader, &mut chroma1[y * chroma_width..][..chroma_width])?;
        count += read_some(reader, &mut chroma2[y * chroma_width..][..chroma_width])?;
    }

    let expected = scene.luma_area() + 2 * scene.chroma_area();
    if count != expected {
        bail!(FormatError::TooSmall);
    }
    Ok((luma, chroma1, chroma2))
}

/// Read as many bytes as the stream will give, reporting the count.
fn read_some<R: Read>(reader: &mut R, dest: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < dest.len() {
        match reader.read(&mut dest[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
