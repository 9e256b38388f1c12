//! Stream layout: every pixel position sampled across all frames, one position after another.
//!
//! Animation frames differ little from each other, so this puts near-identical indices next to
//! each other, which is what the PNG compressor likes.

use crate::error::Error;
use crate::frames::{interleave, resolve_strip, FrameGeometry};
use crate::pal::{IndexedImage, PalIndex, Palette, RGBA};
use imgref::ImgVec;

/// Stream-ordered indices with the geometry of the frames they came from
#[derive(Clone, Debug)]
pub struct PixelStream {
    geometry: FrameGeometry,
    image: IndexedImage,
}

impl PixelStream {
    #[inline]
    #[must_use]
    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    /// `frame_count` wide, `frame_width × frame_height` tall
    #[inline]
    #[must_use]
    pub fn image(&self) -> &IndexedImage {
        &self.image
    }

    #[inline]
    #[must_use]
    pub fn palette(&self) -> &Palette {
        self.image.palette()
    }

    /// All indices in stream order
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[PalIndex] {
        self.image.flat_indices()
    }

    #[must_use]
    pub fn into_image(self) -> IndexedImage {
        self.image
    }
}

/// Interleaves every pixel of every frame. The palette is kept as-is.
pub fn encode(strip: &IndexedImage, frame_count: usize) -> Result<PixelStream, Error> {
    let geometry = FrameGeometry::from_strip(strip.width(), strip.height(), frame_count)?;
    let stream = interleave(strip.flat_indices(), &geometry)?;
    let (width, height) = geometry.stream_size();
    Ok(PixelStream {
        geometry,
        image: IndexedImage::from_checked_parts(strip.palette().clone(), ImgVec::new(stream, width, height)),
    })
}

/// Rebuilds the full-color vertical strip of `frame_width` × `frame_height` frames.
///
/// The image must hold a whole number of frames, whatever its shape.
pub fn decode(stream: &IndexedImage, frame_width: usize, frame_height: usize) -> Result<ImgVec<RGBA>, Error> {
    let geometry = FrameGeometry::from_stream(stream.width(), stream.height(), frame_width, frame_height)?;
    decode_frames(stream, &geometry)
}

/// Like [`decode`] with a known geometry. Indices past the last frame are padding and are ignored.
pub fn decode_frames(stream: &IndexedImage, geometry: &FrameGeometry) -> Result<ImgVec<RGBA>, Error> {
    resolve_strip(stream.flat_indices(), stream.palette(), geometry)
}

#[test]
fn stream_order() {
    let palette = Palette::from_slice(&(0..=255u8).map(|n| RGBA::new(n, n, n, 255)).collect::<Vec<_>>()).unwrap();
    // 4 frames of 10×8, every index encodes (frame, x, y)
    let mut indices = Vec::new();
    for f in 0..4u8 {
        for y in 0..8u8 {
            for x in 0..10u8 {
                indices.push(f * 64 + y * 8 + x % 8);
            }
        }
    }
    let strip = IndexedImage::new(palette, ImgVec::new(indices, 10, 32)).unwrap();
    let stream = encode(&strip, 4).unwrap();

    assert_eq!((4, 80), (stream.image().width(), stream.image().height()));
    assert_eq!(320, stream.indices().len());
    let mut i = 0;
    for y in 0..8 {
        for x in 0..10 {
            for f in 0..4 {
                assert_eq!(strip.flat_indices()[f * 80 + y * 10 + x], stream.indices()[i]);
                i += 1;
            }
        }
    }

    let decoded = decode(stream.image(), 10, 8).unwrap();
    assert_eq!((10, 32), (decoded.width(), decoded.height()));
    assert_eq!(strip.to_rgba().unwrap().buf(), decoded.buf());
}

#[test]
fn decode_any_shape() {
    let palette = Palette::from_slice(&[RGBA::new(0, 0, 0, 255), RGBA::new(1, 1, 1, 255), RGBA::new(2, 2, 2, 255)]).unwrap();
    let strip = IndexedImage::new(palette.clone(), ImgVec::new(vec![0, 1, 2, 2, 1, 0], 3, 2)).unwrap();
    let stream = encode(&strip, 2).unwrap();
    assert_eq!(&[0u8, 2, 1, 1, 2, 0][..], stream.indices());

    // same indices, reshaped into 6×1
    let reshaped = IndexedImage::new(palette.clone(), ImgVec::new(stream.indices().to_vec(), 6, 1)).unwrap();
    assert_eq!(strip.to_rgba().unwrap().buf(), decode(&reshaped, 3, 1).unwrap().buf());

    // padded to 4×2
    let padded = IndexedImage::new(palette, ImgVec::new(vec![0, 2, 1, 1, 2, 0, 0, 0], 4, 2)).unwrap();
    assert!(matches!(decode(&padded, 3, 1), Err(Error::PixelCountNotDivisible { pixels: 8, .. })));
    let geometry = FrameGeometry::from_padded_stream(4, 2, 3, 1, 2).unwrap();
    assert_eq!(strip.to_rgba().unwrap().buf(), decode_frames(&padded, &geometry).unwrap().buf());
}
