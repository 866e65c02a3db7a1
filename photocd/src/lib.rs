/*!
A memory-safe, pure-Rust Kodak Photo CD decoder.

`photocd` reads the image packs produced by the Photo CD scanning
workstations of the early nineties and reconstructs them at any of the six
stored resolutions, from the 192×128 index-print thumbnail up to the
optional 6144×4096 archival scan held in the 64Base sidecar files. The
decoder handles all four Huffman compression classes, assembles the
residual pyramid with the "Kodak standard" bilinear interpolation, and
converts the proprietary PhotoYCC encoding into a choice of well-specified
color spaces: raw Photo CD RGB, CCIR 709 linear light, sRGB, or the raw
YCC components themselves.

# Example
```rust,no_run
use photocd::{PcdDecoder, ColorSpace, Scene};
use std::path::Path;

let mut decoder = PcdDecoder::new();
decoder
    .parse_file(Path::new("IMG0001.PCD"), None, Scene::Base16)
    .unwrap();
decoder.post_parse();
decoder.set_color_space(ColorSpace::Srgb);

let pixels = decoder.width() * decoder.height();
let (mut r, mut g, mut b) = (vec![0u8; pixels], vec![0u8; pixels], vec![0u8; pixels]);
decoder.populate_u8_buffers(&mut r, &mut g, &mut b, None, 1);
```

# Error recovery
Photo CDs are thirty years old and often scratched. A corrupt Huffman
sequence costs at most one run of residual detail; a damaged upper
resolution layer demotes the result to the highest layer that decoded
cleanly, with the reason retained as a warning. Only a pack whose Base/16
thumbnail is unreadable fails outright.

# Threading
With the default `threads` feature, up-resolution and color conversion run
on a small fork-join band pool; decode output is bit-identical with the
feature disabled. Unsafe code is forbidden via a crate-level attribute.
*/

#![forbid(unsafe_code)]
#![forbid(missing_docs)]

#[macro_use]
pub(crate) mod log;

pub mod error;

mod bands;
mod base;
mod bitstream;
mod color;
mod decode;
mod deltas;
mod header;
mod huffman;
mod ipe;
mod metadata;
mod reader;
mod scene;
mod tables;
mod upres;

pub use decode::PcdDecoder;
pub use error::{DecodeError, FormatError, HuffmanError, IpeError, Result, StreamError};
pub use metadata::MetadataKey;
pub use scene::Scene;

/// The color space RGB data is delivered in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorSpace {
    /// Photo CD RGB as stored: converted from YCC, but neither gamma
    /// decoded nor adapted.
    #[default]
    RawPcd,
    /// CCIR 709 primaries, linear light (gamma 1).
    LinearCcir709,
    /// sRGB primaries and transfer curve.
    Srgb,
    /// The raw PhotoYCC components delivered on the R/G/B channels.
    Ycc,
}

/// White balance applied in the CCIR 709 and sRGB spaces.
///
/// Photo CD images are scanned for D65; selecting D50 runs an integer
/// Bradford-style adaptation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WhitePoint {
    /// 6500 K, the Photo CD reference white.
    #[default]
    D65,
    /// 5000 K print viewing white.
    D50,
}

/// Interpolation used when up-resolving planes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum UpResMethod {
    /// Pixel doubling. Only useful for correctness testing.
    Nearest,
    /// The bilinear interpolation Photo CD mastering assumed.
    #[default]
    Bilinear,
    /// Extension point for adaptive chroma interpolation; decodes as
    /// bilinear in this crate.
    LumaAdaptive,
}
