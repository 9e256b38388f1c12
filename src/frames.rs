//! Frame geometry and the interleaving permutation shared by the sequence and stream layouts.
//!
//! Both layouts store the same flat order: for every pixel position `(x, y)` of a frame, that
//! pixel from frame 0, then frame 1, and so on. They only differ in the shape of the container.

use crate::error::Error;
use crate::pal::{PalIndex, Palette, RGBA};
use imgref::ImgVec;

/// `frame_count` frames of `frame_width` × `frame_height` pixels
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FrameGeometry {
    frame_count: usize,
    frame_width: usize,
    frame_height: usize,
}

impl FrameGeometry {
    /// Fails on zero sizes and on pixel counts that overflow
    pub fn new(frame_count: usize, frame_width: usize, frame_height: usize) -> Result<Self, Error> {
        if frame_count == 0 {
            return Err(Error::InvalidFrameCount(frame_count));
        }
        if frame_width == 0 || frame_height == 0 {
            return Err(Error::InvalidFrameSize { width: frame_width, height: frame_height });
        }
        frame_width.checked_mul(frame_height)
            .and_then(|frame| frame.checked_mul(frame_count))
            .ok_or(Error::TooLarge)?;
        Ok(Self { frame_count, frame_width, frame_height })
    }

    /// Frames stacked vertically in a `width` × `height` image
    pub fn from_strip(width: usize, height: usize, frame_count: usize) -> Result<Self, Error> {
        if frame_count == 0 {
            return Err(Error::InvalidFrameCount(frame_count));
        }
        if height % frame_count != 0 {
            return Err(Error::HeightNotDivisible { height, frames: frame_count });
        }
        Self::new(frame_count, width, height / frame_count)
    }

    /// Frames interleaved column by column in a `width` × `height` sequence image
    pub fn from_sequence(width: usize, height: usize, frame_count: usize) -> Result<Self, Error> {
        if frame_count == 0 {
            return Err(Error::InvalidFrameCount(frame_count));
        }
        if width % frame_count != 0 {
            return Err(Error::WidthNotDivisible { width, frames: frame_count });
        }
        Self::new(frame_count, width / frame_count, height)
    }

    /// Frames of known size in a stream image of any shape, without padding
    pub fn from_stream(width: usize, height: usize, frame_width: usize, frame_height: usize) -> Result<Self, Error> {
        if frame_width == 0 || frame_height == 0 {
            return Err(Error::InvalidFrameSize { width: frame_width, height: frame_height });
        }
        let pixels = width.checked_mul(height).ok_or(Error::TooLarge)?;
        let frame_pixels = frame_width.checked_mul(frame_height).ok_or(Error::TooLarge)?;
        if pixels % frame_pixels != 0 {
            return Err(Error::PixelCountNotDivisible { pixels, frame_width, frame_height });
        }
        Self::new(pixels / frame_pixels, frame_width, frame_height)
    }

    /// Like `from_stream`, but with an explicit frame count the raster may end with up to one row of padding
    pub fn from_padded_stream(width: usize, height: usize, frame_width: usize, frame_height: usize, frame_count: usize) -> Result<Self, Error> {
        let geometry = Self::new(frame_count, frame_width, frame_height)?;
        let pixels = width.checked_mul(height).ok_or(Error::TooLarge)?;
        let total = geometry.total_pixels();
        if total > pixels || pixels - total >= width.max(1) {
            return Err(Error::PaddingTooLarge { pixels, frames: frame_count, frame_pixels: geometry.frame_pixels() });
        }
        Ok(geometry)
    }

    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[inline]
    #[must_use]
    pub fn frame_width(&self) -> usize {
        self.frame_width
    }

    #[inline]
    #[must_use]
    pub fn frame_height(&self) -> usize {
        self.frame_height
    }

    #[inline]
    #[must_use]
    pub fn frame_pixels(&self) -> usize {
        self.frame_width * self.frame_height
    }

    /// Pixels in all frames together. Every layout holds exactly this many.
    #[inline]
    #[must_use]
    pub fn total_pixels(&self) -> usize {
        self.frame_pixels() * self.frame_count
    }

    /// One scanline of every frame
    #[inline]
    #[must_use]
    pub fn interleaved_row_len(&self) -> usize {
        self.frame_width * self.frame_count
    }

    /// (width, height) of the vertical strip
    #[must_use]
    pub fn strip_size(&self) -> (usize, usize) {
        (self.frame_width, self.frame_height * self.frame_count)
    }

    /// (width, height) of the sequence layout
    #[must_use]
    pub fn sequence_size(&self) -> (usize, usize) {
        (self.interleaved_row_len(), self.frame_height)
    }

    /// (width, height) of the stream layout
    #[must_use]
    pub fn stream_size(&self) -> (usize, usize) {
        (self.frame_count, self.frame_pixels())
    }
}

/// Strip order (frame, y, x) to interleaved order (y, x, frame)
pub(crate) fn interleave<T: Copy + Default>(strip: &[T], geometry: &FrameGeometry) -> Result<Vec<T>, Error> {
    let total = geometry.total_pixels();
    if strip.len() != total {
        let (width, height) = geometry.strip_size();
        return Err(Error::BufferSizeMismatch { len: strip.len(), width, height });
    }
    let frames = geometry.frame_count();
    let frame_pixels = geometry.frame_pixels();

    let mut out = Vec::new();
    out.try_reserve_exact(total)?;
    out.resize(total, T::default());
    for (f, frame) in strip.chunks_exact(frame_pixels).enumerate() {
        for (dst, &px) in out[f..].iter_mut().step_by(frames).zip(frame) {
            *dst = px;
        }
    }
    Ok(out)
}

/// Interleaved order (y, x, frame) back to strip order (frame, y, x).
///
/// Anything past `total_pixels()` is padding and is ignored.
pub(crate) fn deinterleave<T: Copy + Default>(interleaved: &[T], geometry: &FrameGeometry) -> Result<Vec<T>, Error> {
    let total = geometry.total_pixels();
    if interleaved.len() < total {
        let (width, height) = geometry.stream_size();
        return Err(Error::BufferSizeMismatch { len: interleaved.len(), width, height });
    }
    let frames = geometry.frame_count();
    let frame_pixels = geometry.frame_pixels();

    let mut out = Vec::new();
    out.try_reserve_exact(total)?;
    out.resize(total, T::default());
    for (i, samples) in interleaved[..total].chunks_exact(frames).enumerate() {
        for (f, &px) in samples.iter().enumerate() {
            out[f * frame_pixels + i] = px;
        }
    }
    Ok(out)
}

/// De-interleaves palette indices into a full-color vertical strip
pub(crate) fn resolve_strip(interleaved: &[PalIndex], palette: &Palette, geometry: &FrameGeometry) -> Result<ImgVec<RGBA>, Error> {
    let strip = deinterleave(interleaved, geometry)?;
    let (width, height) = geometry.strip_size();
    Ok(ImgVec::new(palette.resolve(&strip)?, width, height))
}

#[test]
fn geometry_guards() {
    assert!(matches!(FrameGeometry::from_strip(10, 33, 4), Err(Error::HeightNotDivisible { height: 33, frames: 4 })));
    assert!(matches!(FrameGeometry::from_strip(10, 32, 0), Err(Error::InvalidFrameCount(0))));
    assert!(matches!(FrameGeometry::from_sequence(41, 8, 4), Err(Error::WidthNotDivisible { width: 41, frames: 4 })));
    assert!(matches!(FrameGeometry::from_stream(13, 25, 10, 8), Err(Error::PixelCountNotDivisible { pixels: 325, .. })));
    assert!(matches!(FrameGeometry::from_stream(4, 80, 0, 8), Err(Error::InvalidFrameSize { .. })));
    assert!(matches!(FrameGeometry::from_stream(0, 10, 10, 8), Err(Error::InvalidFrameCount(0))));
    assert!(matches!(FrameGeometry::new(usize::MAX, 2, 2), Err(Error::TooLarge)));

    let g = FrameGeometry::from_strip(10, 32, 4).unwrap();
    assert_eq!(FrameGeometry::new(4, 10, 8).unwrap(), g);
    assert_eq!((10, 32), g.strip_size());
    assert_eq!((40, 8), g.sequence_size());
    assert_eq!((4, 80), g.stream_size());
    assert_eq!(320, g.total_pixels());
    assert_eq!(g, FrameGeometry::from_sequence(40, 8, 4).unwrap());
    assert_eq!(g, FrameGeometry::from_stream(4, 80, 10, 8).unwrap());
    assert_eq!(g, FrameGeometry::from_stream(40, 8, 10, 8).unwrap());
}

#[test]
fn padded_stream() {
    let g = FrameGeometry::from_padded_stream(13, 25, 10, 8, 4).unwrap();
    assert_eq!(320, g.total_pixels());
    // 13 × 26 would leave a whole row of padding
    assert!(matches!(FrameGeometry::from_padded_stream(13, 26, 10, 8, 4), Err(Error::PaddingTooLarge { .. })));
    assert!(matches!(FrameGeometry::from_padded_stream(13, 24, 10, 8, 4), Err(Error::PaddingTooLarge { .. })));
}

#[test]
fn interleave_order() {
    // 3 frames of 2×1
    let g = FrameGeometry::new(3, 2, 1).unwrap();
    let strip = [10, 11, 20, 21, 30, 31];
    let out = interleave(&strip, &g).unwrap();
    assert_eq!(vec![10, 20, 30, 11, 21, 31], out);
    assert_eq!(strip.to_vec(), deinterleave(&out, &g).unwrap());
}

#[test]
fn interleave_is_a_permutation() {
    let g = FrameGeometry::new(5, 7, 3).unwrap();
    let strip: Vec<u32> = (0..g.total_pixels() as u32).collect();
    let mut out = interleave(&strip, &g).unwrap();
    assert_ne!(strip, out);
    assert_eq!(strip, deinterleave(&out, &g).unwrap());
    out.sort_unstable();
    assert_eq!(strip, out);
}

#[test]
fn deinterleave_ignores_padding() {
    let g = FrameGeometry::new(2, 2, 1).unwrap();
    assert_eq!(vec![1u8, 3, 2, 4], deinterleave(&[1, 2, 3, 4, 0, 0, 0], &g).unwrap());
    assert!(matches!(deinterleave(&[1u8, 2, 3], &g), Err(Error::BufferSizeMismatch { .. })));
}
