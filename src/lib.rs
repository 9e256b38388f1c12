//! Re-lays animation frames for better PNG compression.
//!
//! Input is a vertical strip: equally sized frames stacked top to bottom. It's reduced to a
//! palette, then the frames are interleaved pixel by pixel, so near-identical pixels of
//! consecutive frames end up next to each other:
//!
//! * the *sequence* layout interleaves scanlines, `frame_count × frame_width` wide,
//! * the *stream* layout is one long run of indices, which is then laid out at whichever raster
//!   width compresses best.
//!
//! Both are reversible. Start with [`Attributes`] and [`Pipeline`].

mod attr;
pub mod dither;
mod error;
mod frames;
pub mod optimize;
mod pal;
mod pipeline;
pub mod png;
mod remap;
pub mod sequence;
pub mod stream;

#[cfg(not(feature = "threads"))]
mod rayoff;

pub use attr::{Attributes, Layout, QuantizeOptions, DEFAULT_MAX_RASTER_WIDTH};
pub use error::{Error, ErrorKind};
pub use frames::FrameGeometry;
pub use optimize::{Candidate, RasterEncoder};
pub use pal::{IndexedImage, PalIndex, Palette, MAX_COLORS, RGBA, RGBA16};
pub use pipeline::Pipeline;
pub use png::{Decoded, PngEncoder};
pub use remap::{Imagequant, Quantizer};
pub use stream::PixelStream;

/// Start here: creates new handle for run configuration
#[inline(always)]
#[must_use]
pub fn new() -> Attributes {
    Attributes::new()
}
