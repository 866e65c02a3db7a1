//! The decode orchestrator: drives header parsing, base image loading, the
//! residual layer ladder, assembly and buffer population.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::base;
use crate::bitstream::BitSource;
use crate::color::{self, ColorPlanes, OutputOptions, OutputSample};
use crate::deltas::{self, DeltaPlanes};
use crate::error::Result;
use crate::header::FileHeader;
use crate::huffman::{self, HuffTable};
use crate::ipe;
use crate::metadata::{self, MetadataKey};
use crate::scene::{HCT_SECTOR_4BASE, ICD_SECTOR, SECTOR_SIZE, Scene};
use crate::tables;
use crate::upres;
use crate::{ColorSpace, UpResMethod, WhitePoint};

/// Index of a residual layer inside the delta store.
fn layer_index(scene: Scene) -> usize {
    scene as usize - Scene::Base4 as usize
}

/// A Photo CD image pack decoder.
///
/// Decoding runs in three steps: [`parse_file`] reads the pack (and the
/// optional 64Base sidecar) into per-layer residual planes and makes the
/// metadata available, [`post_parse`] assembles the residual pyramid into
/// one YCC image, and the `populate_*_buffers` methods convert it into the
/// caller's RGB buffers in the configured color space.
///
/// Failures inside a residual layer are not fatal: the decoder falls back
/// to the highest layer that decoded cleanly and records a warning,
/// available from [`error_string`].
///
/// [`parse_file`]: PcdDecoder::parse_file
/// [`post_parse`]: PcdDecoder::post_parse
/// [`error_string`]: PcdDecoder::error_string
#[derive(Default)]
pub struct PcdDecoder {
    header: Option<FileHeader>,
    scene: Option<Scene>,
    luma: Vec<u8>,
    chroma1: Vec<u8>,
    chroma2: Vec<u8>,
    /// Residual planes for 4Base, 16Base and 64Base, in decode order
    /// luma / chroma1 / chroma2. Consumed by assembly.
    deltas: [[Option<Vec<u8>>; 3]; 3],
    method: UpResMethod,
    color_space: ColorSpace,
    white: WhitePoint,
    monochrome: bool,
    message: String,
}

impl PcdDecoder {
    /// Create a decoder with default settings: raw Photo CD color space,
    /// D65 white point, bilinear interpolation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the image pack at `path` up to `max_scene`.
    ///
    /// `ipe_path` names the 64Base sidecar, when one exists and 64Base
    /// output is wanted. The actually decoded scene may be lower than
    /// requested: a pack simply not carrying the requested level is not an
    /// error, and a damaged upper layer demotes with a warning. After this
    /// call the metadata and image size are available, but pixel data
    /// needs [`post_parse`] first.
    ///
    /// [`post_parse`]: PcdDecoder::post_parse
    pub fn parse_file(
        &mut self,
        path: &Path,
        ipe_path: Option<&Path>,
        max_scene: Scene,
    ) -> Result<()> {
        self.reset();

        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(error) => {
                self.message =
                    "Could not open PCD file - may be a file permissions problem".to_string();
                return Err(error.into());
            }
        };

        let header = match FileHeader::parse(&mut file) {
            Ok(header) => header,
            Err(error) => {
                self.message = error.to_string();
                return Err(error);
            }
        };

        let mut scene = max_scene;
        // The resolution code only describes the main file; 64Base
        // availability is a matter of the sidecar.
        if header.resolution < Scene::Base16 {
            scene = scene.min(header.resolution);
        }
        // Metadata stays readable even when no image data can be.
        self.header = Some(header);

        let base = match base::read_base_image(&mut file, scene) {
            Ok(base) => base,
            Err(error) => {
                self.message = error.to_string();
                return Err(error);
            }
        };
        if base.scene < Scene::Base {
            scene = base.scene;
        }
        self.luma = base.luma;
        self.chroma1 = base.chroma1;
        self.chroma2 = base.chroma2;

        if scene >= Scene::Base4 {
            if let Err(error) = self.read_4base_layer(&mut file) {
                scene = Scene::Base;
                self.deltas[layer_index(Scene::Base4)] = Default::default();
                self.warn(format_args!("{error} while processing 4Base image"));
            } else if scene >= Scene::Base16 {
                if let Err(error) = self.read_16base_layer(&mut file) {
                    scene = Scene::Base4;
                    self.deltas[layer_index(Scene::Base16)] = Default::default();
                    self.warn(format_args!("{error} while processing 16Base image"));
                } else if scene >= Scene::Base64 {
                    if let Err(error) = self.read_64base_layer(ipe_path) {
                        scene = Scene::Base16;
                        self.warn(format_args!("{error}"));
                    }
                }
            }
        }

        self.scene = Some(scene);
        Ok(())
    }

    /// Assemble the decoded residual layers into one YCC image at the
    /// final scene. Idempotent; each layer is consumed as it is applied.
    pub fn post_parse(&mut self) {
        if self.header.is_none() {
            return;
        }
        let method = self.method.min(UpResMethod::Bilinear);

        for scene in [Scene::Base4, Scene::Base16, Scene::Base64] {
            let layer = layer_index(scene);
            if self.deltas[layer][0].is_none() {
                continue;
            }
            let width = scene.luma_width();
            let height = scene.luma_height();

            let mut luma = self.deltas[layer][0].take().expect("luma deltas present");
            upres::up_res(&self.luma, &mut luma, width, height, method, true);
            self.luma = luma;

            // Chroma keeps pace at half the luma size; a missing chroma
            // residual plane up-resolves with zero deltas.
            let half_area = (width >> 1) * (height >> 1);
            let has_deltas = self.deltas[layer][1].is_some();
            let mut chroma1 =
                self.deltas[layer][1].take().unwrap_or_else(|| vec![0; half_area]);
            upres::up_res(&self.chroma1, &mut chroma1, width >> 1, height >> 1, method, has_deltas);
            self.chroma1 = chroma1;

            let has_deltas = self.deltas[layer][2].is_some();
            let mut chroma2 =
                self.deltas[layer][2].take().unwrap_or_else(|| vec![0; half_area]);
            upres::up_res(&self.chroma2, &mut chroma2, width >> 1, height >> 1, method, has_deltas);
            self.chroma2 = chroma2;
        }
    }

    /// Image width after rotation to the upright orientation.
    pub fn width(&self) -> usize {
        let Some(scene) = self.scene else { return 0 };
        match self.orientation() {
            1 | 3 => scene.luma_height(),
            _ => scene.luma_width(),
        }
    }

    /// Image height after rotation to the upright orientation.
    pub fn height(&self) -> usize {
        let Some(scene) = self.scene else { return 0 };
        match self.orientation() {
            1 | 3 => scene.luma_width(),
            _ => scene.luma_height(),
        }
    }

    /// The scene the decoder settled on, when a file has been parsed.
    pub fn scene(&self) -> Option<Scene> {
        self.scene
    }

    /// Orientation of the original image: 0 upright, then 90° CCW steps.
    /// Populated buffers are always rotated to orientation 0.
    pub fn orientation(&self) -> u32 {
        self.header.as_ref().map_or(0, |header| header.rotation)
    }

    /// Whether the pack advertises a 64Base image pack extension. The
    /// sidecar itself lives outside the main file and still has to be
    /// named in [`parse_file`](PcdDecoder::parse_file).
    pub fn ipe_available(&self) -> bool {
        self.header.as_ref().is_some_and(|header| header.ipe_available)
    }

    /// Whether chroma is ignored during conversion; see
    /// [`set_monochrome`](PcdDecoder::set_monochrome).
    pub fn is_monochrome(&self) -> bool {
        self.monochrome
    }

    /// Process the image as monochrome, ignoring chroma data. Latches: a
    /// decoder that became monochrome stays monochrome. The populated
    /// buffers are still three-channel, and the channels are generally
    /// not equal; that depends on the color space and white balance.
    pub fn set_monochrome(&mut self, value: bool) {
        self.monochrome |= value;
    }

    /// Select the chroma up-resolution method. Defaults to bilinear, the
    /// interpolation Photo CD imaging workstations assumed;
    /// nearest-neighbour exists for testing. [`UpResMethod::LumaAdaptive`]
    /// is an extension point and decodes as bilinear here.
    pub fn set_interpolation(&mut self, method: UpResMethod) {
        self.method = method;
    }

    /// Select the color space RGB data is returned in.
    pub fn set_color_space(&mut self, color_space: ColorSpace) {
        self.color_space = color_space;
    }

    /// The color space RGB data is returned in.
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// Select the white balance for the CCIR 709 and sRGB spaces. Photo CD
    /// scans assume D65; D50 applies a chromatic adaptation on top.
    pub fn set_white_balance(&mut self, white: WhitePoint) {
        self.white = white;
    }

    /// Seconds since the Unix epoch at which the image was scanned, or 0
    /// when no file has been parsed.
    pub fn digitisation_time(&self) -> i64 {
        self.header
            .as_ref()
            .map_or(0, |header| i64::from(header.scanning_time()))
    }

    /// The registered film term of the scanned medium as
    /// `(FTN, product code, gamma code)`. A gamma code of -1 means the
    /// term defines none; all zeros means no film term data is available.
    pub fn film_term_data(&self) -> (i32, i32, i32) {
        let Some(header) = &self.header else { return (0, 0, 0) };
        if !header.has_sba() {
            return (0, 0, 0);
        }
        match tables::film_term(header.sba_ftn()) {
            Some((ftn, pc, gc)) => (i32::from(ftn), i32::from(pc), i32::from(gc)),
            None => (0, 0, 0),
        }
    }

    /// A metadata dictionary entry as `(description, value)`, or `None`
    /// when no file has been parsed.
    pub fn metadata(&self, key: MetadataKey) -> Option<(&'static str, String)> {
        let header = self.header.as_ref()?;
        let huffman_class = header.huffman_class;
        Some((key.description(), metadata::render(header, key, huffman_class)))
    }

    /// The most recent error or warning in human-readable form; empty when
    /// decoding was clean.
    pub fn error_string(&self) -> &str {
        &self.message
    }

    /// Populate planar 8-bit RGB(A) buffers. `stride` is the element
    /// distance between successive pixels within each buffer. Each buffer
    /// must hold at least `width() * height() * stride` elements.
    pub fn populate_u8_buffers(
        &mut self,
        red: &mut [u8],
        green: &mut [u8],
        blue: &mut [u8],
        alpha: Option<&mut [u8]>,
        stride: usize,
    ) {
        self.populate(red, green, blue, alpha, stride);
    }

    /// Populate planar 16-bit RGB(A) buffers; see
    /// [`populate_u8_buffers`](PcdDecoder::populate_u8_buffers).
    pub fn populate_u16_buffers(
        &mut self,
        red: &mut [u16],
        green: &mut [u16],
        blue: &mut [u16],
        alpha: Option<&mut [u16]>,
        stride: usize,
    ) {
        self.populate(red, green, blue, alpha, stride);
    }

    /// Populate planar float RGB(A) buffers in 0.0..=1.0; see
    /// [`populate_u8_buffers`](PcdDecoder::populate_u8_buffers).
    pub fn populate_f32_buffers(
        &mut self,
        red: &mut [f32],
        green: &mut [f32],
        blue: &mut [f32],
        alpha: Option<&mut [f32]>,
        stride: usize,
    ) {
        self.populate(red, green, blue, alpha, stride);
    }

    fn populate<T: OutputSample>(
        &mut self,
        red: &mut [T],
        green: &mut [T],
        blue: &mut [T],
        alpha: Option<&mut [T]>,
        stride: usize,
    ) {
        let Some(scene) = self.scene else { return };
        // Late assembly keeps the call order forgiving; post_parse is a
        // no-op when the residuals are already merged.
        self.post_parse();

        let width = scene.luma_width();
        let height = scene.luma_height();
        let method = self.method;

        // Chroma may still be subsampled relative to luma.
        let mut res_shift = chroma_shift(self.luma.len(), self.chroma1.len());
        let mut chroma1 = None;
        let mut chroma2 = None;
        if !self.monochrome {
            if res_shift > 0 && method >= UpResMethod::Bilinear {
                chroma1 =
                    Some(upres::interpolate_chroma(&self.chroma1, width, height, res_shift, method));
                chroma2 =
                    Some(upres::interpolate_chroma(&self.chroma2, width, height, res_shift, method));
                res_shift = 0;
            }
        }

        let planes = ColorPlanes {
            luma: &self.luma,
            chroma1: if self.monochrome {
                None
            } else {
                Some(chroma1.as_deref().unwrap_or(&self.chroma1))
            },
            chroma2: if self.monochrome {
                None
            } else {
                Some(chroma2.as_deref().unwrap_or(&self.chroma2))
            },
            width,
            height,
            res_shift,
        };
        let options = OutputOptions {
            color_space: self.color_space,
            white: self.white,
            rotation: self.orientation(),
            stride: stride.max(1),
        };
        color::populate(&planes, &options, red, green, blue, alpha);
    }

    fn reset(&mut self) {
        let settings = (
            self.method,
            self.color_space,
            self.white,
            self.monochrome,
        );
        *self = Self::default();
        (self.method, self.color_space, self.white, self.monochrome) = settings;
    }

    fn warn(&mut self, message: std::fmt::Arguments<'_>) {
        lwarn!("{}", message);
        if self.message.is_empty() {
            self.message = message.to_string();
        }
    }

    fn read_4base_layer(&mut self, file: &mut File) -> Result<()> {
        let tables = read_table_block(file, SECTOR_SIZE * HCT_SECTOR_4BASE, 1)?;
        let scene = Scene::Base4;
        file.seek(SeekFrom::Start(
            (SECTOR_SIZE * ICD_SECTOR[scene as usize]) as u64,
        ))?;

        // 4Base refines luma only; chroma stays at Base resolution.
        let mut luma = vec![0u8; scene.luma_area()];
        let mut bits = BitSource::new(&mut *file)?;
        let mut planes = DeltaPlanes { luma: Some(&mut luma), ..Default::default() };
        deltas::read_deltas(&mut bits, &tables, scene, 0, 0, &mut planes, 0)?;

        self.deltas[layer_index(scene)][0] = Some(luma);
        Ok(())
    }

    fn read_16base_layer(&mut self, file: &mut File) -> Result<()> {
        let header = self.header.as_ref().expect("header parsed");
        let table_count = if self.monochrome { 1 } else { 3 };
        let tables =
            read_table_block(file, SECTOR_SIZE * header.hct_sector_16base(), table_count)?;
        let scene = Scene::Base16;
        file.seek(SeekFrom::Start(
            (SECTOR_SIZE * header.icd_sector_16base()) as u64,
        ))?;

        let mut luma = vec![0u8; scene.luma_area()];
        let mut chroma1 =
            (!self.monochrome).then(|| vec![0u8; scene.chroma_area()]);
        let mut chroma2 =
            (!self.monochrome).then(|| vec![0u8; scene.chroma_area()]);

        let mut bits = BitSource::new(&mut *file)?;
        let mut planes = DeltaPlanes {
            luma: Some(&mut luma),
            chroma1: chroma1.as_deref_mut(),
            chroma2: chroma2.as_deref_mut(),
        };
        deltas::read_deltas(&mut bits, &tables, scene, 0, 0, &mut planes, 0)?;

        let layer = layer_index(scene);
        self.deltas[layer][0] = Some(luma);
        self.deltas[layer][1] = chroma1;
        self.deltas[layer][2] = chroma2;
        Ok(())
    }

    fn read_64base_layer(&mut self, ipe_path: Option<&Path>) -> Result<()> {
        let Some(ipe_path) = ipe_path else {
            return Err(crate::error::IpeError::Unreadable.into());
        };
        let image = ipe::parse_ipe(ipe_path, self.monochrome)?;
        let layer = layer_index(Scene::Base64);
        self.deltas[layer][0] = Some(image.luma);
        self.deltas[layer][1] = image.chroma1;
        self.deltas[layer][2] = image.chroma2;
        Ok(())
    }
}

/// Read a Huffman table block from `offset` and expand its tables.
fn read_table_block(file: &mut File, offset: usize, count: usize) -> Result<[HuffTable; 3]> {
    file.seek(SeekFrom::Start(offset as u64))?;
    let mut block = vec![0u8; huffman::table_block_len(count)];
    let mut filled = 0;
    while filled < block.len() {
        match file.read(&mut block[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    block.truncate(filled);
    huffman::read_tables(&block, count)
}

/// log2 of the chroma subsampling still present between two plane sizes.
fn chroma_shift(luma_len: usize, chroma_len: usize) -> u32 {
    if chroma_len * 4 == luma_len {
        1
    } else if chroma_len * 16 == luma_len {
        2
    } else {
        0
    }
}
