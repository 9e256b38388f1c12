use std::collections::TryReserveError;
use std::io;
use thiserror::Error as ThisError;

/// Everything that can stop a run.
///
/// There is no retry anywhere: every error is terminal for the operation that returned it.
#[derive(Debug, ThisError)]
#[non_exhaustive]
pub enum Error {
    /// Width or height is zero
    #[error("image dimensions cannot be zero")]
    EmptyImage,
    /// Slice length doesn't agree with width × height
    #[error("pixel buffer length {len} does not match dimensions {width}x{height}")]
    BufferSizeMismatch { len: usize, width: usize, height: usize },
    /// Frame count must be at least 1
    #[error("frame count must be at least 1, got {0}")]
    InvalidFrameCount(usize),
    /// Frame width and height must be at least 1
    #[error("frame dimensions must be non-zero, got {width}x{height}")]
    InvalidFrameSize { width: usize, height: usize },
    /// Vertical strip can't be split into equally tall frames
    #[error("image height {height} is not evenly divisible by frame count {frames}")]
    HeightNotDivisible { height: usize, frames: usize },
    /// Sequence image can't be split into equally wide frames
    #[error("image width {width} is not evenly divisible by frame count {frames}")]
    WidthNotDivisible { width: usize, frames: usize },
    /// Stream image doesn't hold a whole number of frames
    #[error("image of {pixels} pixels does not hold a whole number of {frame_width}x{frame_height} frames")]
    PixelCountNotDivisible { pixels: usize, frame_width: usize, frame_height: usize },
    /// Stream image is too small for the frames, or its padding is longer than one row
    #[error("image of {pixels} pixels can't hold {frames} frames of {frame_pixels} pixels with less than one row of padding")]
    PaddingTooLarge { pixels: usize, frames: usize, frame_pixels: usize },
    /// Index buffer refers past the end of its palette
    #[error("palette index {index} is out of range for a palette of {len} colors")]
    IndexOutOfPalette { index: u8, len: usize },
    /// Palettes hold at most 256 colors
    #[error("palette cannot hold more than 256 colors, got {0}")]
    TooManyColors(usize),
    /// Function called with invalid arguments
    #[error("{0} is out of range")]
    ValueOutOfRange(&'static str),
    /// The operation needs a palette image
    #[error("input is not a palette image")]
    NotPaletted,
    /// Dimensions overflow the address space
    #[error("image is too large")]
    TooLarge,
    /// Every raster width was filtered out
    #[error("no raster width candidate was accepted")]
    NoRasterCandidate,
    /// The palette remapper failed
    #[error("palette quantization failed: {0}")]
    Quantize(#[from] imagequant::Error),
    /// The PNG codec failed
    #[error("PNG codec failed: {0}")]
    Png(#[from] lodepng::Error),
    /// PNG decoded into a pixel format this tool doesn't handle
    #[error("unsupported PNG pixel format")]
    Unsupported,
    /// Allocation failed
    #[error("out of memory")]
    OutOfMemory,
    /// File could not be read or written
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Coarse classification of [`Error`], used to pick a process exit status.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Bad dimensions, frame counts, arguments or image contents
    Validation,
    /// The quantizer, PNG codec or allocator failed
    External,
    /// File system failure
    Io,
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Quantize(_) | Self::Png(_) | Self::Unsupported | Self::OutOfMemory => ErrorKind::External,
            Self::Io(_) => ErrorKind::Io,
            _ => ErrorKind::Validation,
        }
    }

    /// sysexits.h status for the error's kind
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Validation => 65,
            ErrorKind::External => 70,
            ErrorKind::Io => 74,
        }
    }
}

impl From<TryReserveError> for Error {
    #[cold]
    fn from(_: TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

#[test]
fn kinds() {
    assert_eq!(ErrorKind::Validation, Error::HeightNotDivisible { height: 7, frames: 2 }.kind());
    assert_eq!(ErrorKind::External, Error::Quantize(imagequant::Error::OutOfMemory).kind());
    assert_eq!(ErrorKind::Io, Error::from(io::Error::from(io::ErrorKind::NotFound)).kind());
    assert_eq!(65, Error::NotPaletted.exit_code());
    assert_eq!(74, Error::Io(io::ErrorKind::PermissionDenied.into()).exit_code());
}

#[test]
fn messages() {
    let err = Error::HeightNotDivisible { height: 33, frames: 4 };
    assert_eq!("image height 33 is not evenly divisible by frame count 4", err.to_string());
}
