//! Raster width search.
//!
//! PNG size depends on how similar neighboring scanlines are, and for interleaved animation data
//! that varies non-monotonically with the raster width. There's no formula for the best width,
//! so every candidate up to the cap is encoded and measured.

use crate::attr::Attributes;
use crate::error::Error;
use crate::pal::{PalIndex, Palette};
use crate::stream::PixelStream;
use imgref::{ImgRef, ImgVec};
use std::cell::RefCell;

#[cfg(not(feature = "threads"))]
use crate::rayoff::*;
#[cfg(feature = "threads")]
use rayon::prelude::*;
#[cfg(feature = "threads")]
use thread_local::ThreadLocal;

#[cfg(feature = "threads")]
fn num_cpus() -> usize {
    rayon::current_num_threads()
}

/// Lossless compressor whose output size is being minimized
pub trait RasterEncoder: Sync {
    fn encode(&self, indices: ImgRef<'_, PalIndex>, palette: &Palette) -> Result<Vec<u8>, Error>;
}

/// One encoded raster width
#[derive(Clone, Debug)]
pub struct Candidate {
    pub width: usize,
    pub height: usize,
    /// Padding cells after the end of the stream
    pub wasted: usize,
    pub encoded: Vec<u8>,
}

impl Candidate {
    /// Encoded size in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.encoded.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.encoded.is_empty()
    }

    /// `file_name` prefixed with the raster width, e.g. `40-anim.png`
    #[must_use]
    pub fn tagged_file_name(&self, file_name: &str) -> String {
        format!("{}-{}", self.width, file_name)
    }
}

/// Widths `step`, `2·step`, … up to `total`, clamped to `cap`. The clamped width is the last one.
#[derive(Clone, Debug)]
pub struct CandidateWidths {
    step: usize,
    total: usize,
    cap: usize,
    next: usize,
    done: bool,
}

#[must_use]
pub fn candidate_widths(step: usize, total: usize, cap: usize) -> CandidateWidths {
    CandidateWidths {
        step,
        total,
        cap,
        next: step,
        done: step == 0 || cap == 0 || step > total,
    }
}

impl Iterator for CandidateWidths {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.done {
            return None;
        }
        let width = self.next.min(self.cap);
        match self.next.checked_add(self.step) {
            Some(next) if width < self.cap && next <= self.total => self.next = next,
            _ => self.done = true,
        }
        Some(width)
    }
}

/// Height and number of padding cells of `total` cells laid out `width` wide
#[inline]
#[must_use]
pub fn raster_size(total: usize, width: usize) -> (usize, usize) {
    let height = (total + width - 1) / width;
    (height, width * height - total)
}

fn fill_raster(buf: &mut Vec<PalIndex>, stream: &[PalIndex], width: usize) -> Result<usize, Error> {
    let (height, _) = raster_size(stream.len(), width);
    let len = width * height;
    buf.clear();
    buf.try_reserve(len)?;
    buf.extend_from_slice(stream);
    buf.resize(len, 0);
    Ok(height)
}

/// The stream laid out `width` wide, padded with index 0 after the last pixel
pub fn raster(stream: &[PalIndex], width: usize) -> Result<ImgVec<PalIndex>, Error> {
    if width == 0 || stream.is_empty() {
        return Err(Error::EmptyImage);
    }
    let mut buf = Vec::new();
    let height = fill_raster(&mut buf, stream, width)?;
    Ok(ImgVec::new(buf, width, height))
}

/// Encodes the stream at every candidate width.
///
/// Returns only the candidates that were strictly smaller than every one before them, in the
/// order they were found, so sizes are strictly decreasing and the last one is the best.
/// Ties keep the earlier (narrower) candidate.
pub fn search<E: RasterEncoder>(attr: &Attributes, stream: &PixelStream, encoder: &E) -> Result<Vec<Candidate>, Error> {
    let data = stream.indices();
    let palette = stream.palette();
    let total = data.len();
    let step = stream.geometry().interleaved_row_len();

    let widths: Vec<usize> = candidate_widths(step, total, attr.max_raster_width())
        .filter(|&width| !attr.zero_waste_only() || raster_size(total, width).1 == 0)
        .collect();
    attr.verbose_print(format!("  trying {} raster widths", widths.len()));

    let scratch = ThreadLocal::new();
    let mut best_len = usize::MAX;
    let mut improvements = Vec::new();

    // a batch is evaluated in parallel, but reduced in candidate order
    for batch in widths.chunks(num_cpus().max(1)) {
        let trials: Vec<Result<Candidate, Error>> = batch.par_iter().map(|&width| {
            let buf = scratch.get_or(|| RefCell::new(Vec::new()));
            let mut buf = buf.borrow_mut();
            let height = fill_raster(&mut buf, data, width)?;
            let encoded = encoder.encode(ImgRef::new(&buf[..], width, height), palette)?;
            Ok(Candidate { width, height, wasted: width * height - total, encoded })
        }).collect();

        for trial in trials {
            let candidate = trial?;
            attr.verbose_print(format!("  raster {}x{} ({} wasted)...{} bytes", candidate.width, candidate.height, candidate.wasted, candidate.len()));
            if candidate.len() < best_len {
                best_len = candidate.len();
                improvements.push(candidate);
            }
        }
    }

    match improvements.last() {
        Some(best) => attr.verbose_print(format!("  best raster width {} ({} bytes)", best.width, best.len())),
        None => return Err(Error::NoRasterCandidate),
    }
    Ok(improvements)
}

#[cfg(test)]
mod test_encoder {
    use super::*;

    /// Size is the number of index changes between horizontally or vertically adjacent cells
    pub(super) struct Edges;

    impl RasterEncoder for Edges {
        fn encode(&self, indices: ImgRef<'_, PalIndex>, _: &Palette) -> Result<Vec<u8>, Error> {
            let mut changes = 1;
            for (y, row) in indices.rows().enumerate() {
                changes += row.windows(2).filter(|w| w[0] != w[1]).count();
                if y > 0 {
                    let above = indices.rows().nth(y - 1).unwrap_or(row);
                    changes += row.iter().zip(above).filter(|(a, b)| a != b).count();
                }
            }
            Ok(vec![0; changes])
        }
    }
}

#[test]
fn widths() {
    assert_eq!(vec![40, 80, 120, 160, 200, 240, 280, 320], candidate_widths(40, 320, 300_000).collect::<Vec<_>>());
    assert_eq!(vec![40, 80, 100], candidate_widths(40, 320, 100).collect::<Vec<_>>());
    assert_eq!(vec![40, 80], candidate_widths(40, 320, 80).collect::<Vec<_>>());
    assert_eq!(vec![25], candidate_widths(40, 320, 25).collect::<Vec<_>>());
    assert_eq!(vec![7], candidate_widths(7, 7, 300_000).collect::<Vec<_>>());
    assert_eq!(0, candidate_widths(0, 320, 100).count());
}

#[test]
fn raster_padding() {
    let stream: Vec<u8> = (0..320).map(|n| (n % 200 + 1) as u8).collect();

    let r = raster(&stream, 40).unwrap();
    assert_eq!((40, 8), (r.width(), r.height()));
    assert_eq!(&stream[..], r.buf());

    let r = raster(&stream, 13).unwrap();
    assert_eq!((13, 25), (r.width(), r.height()));
    assert_eq!(&stream[..], &r.buf()[..320]);
    assert_eq!(&[0u8; 5][..], &r.buf()[320..]);
    assert_eq!((25, 5), raster_size(320, 13));
}

#[cfg(test)]
fn test_stream(frames: usize, width: usize, height: usize) -> PixelStream {
    use crate::pal::{IndexedImage, RGBA};

    let palette = Palette::from_slice(&(0..16u8).map(|n| RGBA::new(n * 16, n, 255 - n, 255)).collect::<Vec<_>>()).unwrap();
    // frames differ only in a small moving block
    let mut indices = Vec::new();
    for f in 0..frames {
        for y in 0..height {
            for x in 0..width {
                let moving = x / 3 == f % (width / 3) && y < 2;
                indices.push(if moving { 15 } else { ((x / 2 + y) % 4) as u8 });
            }
        }
    }
    let strip = IndexedImage::new(palette, ImgVec::new(indices, width, frames * height)).unwrap();
    crate::stream::encode(&strip, frames).unwrap()
}

#[test]
fn strictly_improving() {
    let stream = test_stream(4, 10, 8);
    let attr = Attributes::new();
    let found = search(&attr, &stream, &test_encoder::Edges).unwrap();
    assert!(!found.is_empty());
    assert!(found.windows(2).all(|w| w[1].len() < w[0].len()));
    assert!(found.windows(2).all(|w| w[1].width > w[0].width));
    assert_eq!(40, found[0].width);

    // the last one is the global minimum, and the earliest of equals
    let best = found.last().unwrap();
    for width in candidate_widths(40, 320, attr.max_raster_width()) {
        let r = raster(stream.indices(), width).unwrap();
        let len = test_encoder::Edges.encode(r.as_ref(), stream.palette()).unwrap().len();
        assert!(len > best.len() || (len == best.len() && width >= best.width));
    }
}

#[test]
fn cap_and_waste_filter() {
    let stream = test_stream(3, 6, 5);
    let mut attr = Attributes::new();
    attr.set_max_raster_width(50).unwrap();
    let found = search(&attr, &stream, &test_encoder::Edges).unwrap();
    assert!(found.iter().all(|c| c.width <= 50));

    attr.set_zero_waste_only(true);
    let found = search(&attr, &stream, &test_encoder::Edges).unwrap();
    assert!(found.iter().all(|c| c.wasted == 0 && 90 % c.width == 0));

    // the only candidate is clamped to 7, which doesn't divide 90
    attr.set_max_raster_width(7).unwrap();
    assert!(matches!(search(&attr, &stream, &test_encoder::Edges), Err(Error::NoRasterCandidate)));
}

#[test]
fn tagged_names() {
    let c = Candidate { width: 40, height: 8, wasted: 0, encoded: vec![1, 2, 3] };
    assert_eq!("40-anim.png", c.tagged_file_name("anim.png"));
    assert_eq!(3, c.len());
}
