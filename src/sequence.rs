//! Sequence layout: a vertical strip of `frame_count` frames becomes one image
//! `frame_count × frame_width` wide and `frame_height` tall. Column `f + frame_count·x` of row `y`
//! is pixel `(x, y)` of frame `f`.

use crate::error::Error;
use crate::frames::{interleave, resolve_strip, FrameGeometry};
use crate::pal::{IndexedImage, RGBA};
use imgref::ImgVec;

/// Interleaves the scanlines of all frames. The palette is kept as-is.
pub fn encode(strip: &IndexedImage, frame_count: usize) -> Result<IndexedImage, Error> {
    let geometry = FrameGeometry::from_strip(strip.width(), strip.height(), frame_count)?;
    let sequence = interleave(strip.flat_indices(), &geometry)?;
    let (width, height) = geometry.sequence_size();
    Ok(IndexedImage::from_checked_parts(strip.palette().clone(), ImgVec::new(sequence, width, height)))
}

/// Rebuilds the full-color vertical strip.
///
/// The output is not indexed: it's meant for editing, not for compressing again.
pub fn decode(sequence: &IndexedImage, frame_count: usize) -> Result<ImgVec<RGBA>, Error> {
    let geometry = FrameGeometry::from_sequence(sequence.width(), sequence.height(), frame_count)?;
    resolve_strip(sequence.flat_indices(), sequence.palette(), &geometry)
}

#[cfg(test)]
fn numbered_strip(frames: usize, width: usize, height: usize) -> IndexedImage {
    use crate::pal::Palette;

    let palette = Palette::from_slice(&(0..=255u8).map(|n| RGBA::new(n, 255 - n, n / 2, 255)).collect::<Vec<_>>()).unwrap();
    let indices = (0..frames * width * height).map(|n| (n % 251) as u8).collect();
    IndexedImage::new(palette, ImgVec::new(indices, width, frames * height)).unwrap()
}

#[test]
fn four_frames_of_10x8() {
    let strip = numbered_strip(4, 10, 8);
    let seq = encode(&strip, 4).unwrap();
    assert_eq!((40, 8), (seq.width(), seq.height()));
    assert_eq!(strip.palette(), seq.palette());

    let seq_px = seq.indices();
    let strip_px = strip.indices();
    for f in 0..4usize {
        for y in 0..8usize {
            for x in 0..10usize {
                assert_eq!(strip_px[(x, y + f * 8)], seq_px[(f + 4 * x, y)]);
            }
        }
    }

    let decoded = decode(&seq, 4).unwrap();
    assert_eq!((10, 32), (decoded.width(), decoded.height()));
    assert_eq!(strip.to_rgba().unwrap().buf(), decoded.buf());
}

#[test]
fn single_frame_is_identity() {
    let strip = numbered_strip(1, 6, 5);
    let seq = encode(&strip, 1).unwrap();
    assert_eq!(strip.indices().buf(), seq.indices().buf());
}

#[test]
fn divisibility_guards() {
    let strip = numbered_strip(3, 4, 3);
    assert!(matches!(encode(&strip, 2), Err(Error::HeightNotDivisible { height: 9, frames: 2 })));
    assert!(matches!(encode(&strip, 0), Err(Error::InvalidFrameCount(0))));

    let seq = encode(&strip, 3).unwrap();
    assert!(matches!(decode(&seq, 5), Err(Error::WidthNotDivisible { width: 12, frames: 5 })));
}
