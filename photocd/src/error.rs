//! Error types for Photo CD decoding.

use std::fmt;
use std::io;

/// The main error type for Photo CD decoding operations.
#[derive(Debug)]
pub enum DecodeError {
    /// An I/O error while reading the image pack or a sidecar file.
    Io(io::Error),
    /// Errors related to the fixed file header.
    Format(FormatError),
    /// Errors related to Huffman tables and the compressed bitstream.
    Huffman(HuffmanError),
    /// Errors related to the residual delta streams.
    Stream(StreamError),
    /// Errors related to the 64Base IPE sidecar and its extension files.
    Ipe(IpeError),
}

/// Errors related to the fixed file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    /// The signature does not identify a Photo CD image pack.
    NotAPcdFile,
    /// The file is an overview (thumbnail) pack, which carries no scene data.
    OverviewFile,
    /// The file is shorter than the fixed header.
    TooSmall,
    /// The pack interleaves ADPCM audio with the image data.
    InterleavedAudio,
    /// Not even the Base/16 image could be read.
    NoValidBaseImage,
}

/// Errors related to Huffman tables and the compressed bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanError {
    /// A code table entry declares a code longer than 16 bits.
    CodeTooLong,
    /// The stream ended while the bit reader still expected data.
    UnexpectedEndOfStream,
}

/// Errors related to the residual delta streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    /// A sequence preamble carries a plane code the format does not define.
    CorruptImage,
    /// A sequence preamble addresses pixels outside its destination plane.
    OutOfRange,
}

/// Errors related to the 64Base IPE sidecar and its extension files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpeError {
    /// The IPE path is too short to carry the 8.3 naming convention.
    PathTooShort,
    /// The IPE file could not be opened.
    Unreadable,
    /// The IPE file is shorter than its own header claims.
    TooSmall,
    /// The layer count is neither 1 nor 3.
    InvalidLayerCount,
    /// The filename table is empty, oversized, or smaller than the layer count.
    InvalidFileCount,
    /// A pointer-table run references an extension file that cannot be opened.
    ExtensionUnreadable,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{e}"),
            Self::Format(e) => write!(f, "{e}"),
            Self::Huffman(e) => write!(f, "{e}"),
            Self::Stream(e) => write!(f, "{e}"),
            Self::Ipe(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAPcdFile => write!(f, "That is not a valid PCD file"),
            Self::OverviewFile => {
                write!(f, "The file is a PCD overview file and carries no image pack")
            }
            Self::TooSmall => write!(f, "PCD file is too small to be valid"),
            Self::InterleavedAudio => write!(f, "The file contains interleaved audio"),
            Self::NoValidBaseImage => write!(f, "No valid base image could be found"),
        }
    }
}

impl fmt::Display for HuffmanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CodeTooLong => write!(f, "Huffman code error"),
            Self::UnexpectedEndOfStream => {
                write!(f, "Unexpected end of file in Huffman sequence")
            }
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CorruptImage => write!(f, "Corrupt image"),
            Self::OutOfRange => write!(f, "Sequence addresses pixels outside the image"),
        }
    }
}

impl fmt::Display for IpeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathTooShort => write!(f, "IPE filename too short to be valid"),
            Self::Unreadable => write!(f, "Could not open 64Base IPE file"),
            Self::TooSmall => write!(f, "IC file too small"),
            Self::InvalidLayerCount => write!(f, "Invalid number of layers"),
            Self::InvalidFileCount => write!(f, "Invalid number of IPE files"),
            Self::ExtensionUnreadable => write!(f, "Could not open 64Base extension image"),
        }
    }
}

impl std::error::Error for DecodeError {}
impl std::error::Error for FormatError {}
impl std::error::Error for HuffmanError {}
impl std::error::Error for StreamError {}
impl std::error::Error for IpeError {}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<FormatError> for DecodeError {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl From<HuffmanError> for DecodeError {
    fn from(e: HuffmanError) -> Self {
        Self::Huffman(e)
    }
}

impl From<StreamError> for DecodeError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

impl From<IpeError> for DecodeError {
    fn from(e: IpeError) -> Self {
        Self::Ipe(e)
    }
}

/// Result type for Photo CD decoding operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

macro_rules! bail {
    ($err:expr) => {
        return Err($err.into())
    };
}

pub(crate) use bail;
