use crate::error::Error;
use arrayvec::ArrayVec;
use imgref::{ImgRef, ImgVec};
use std::ops::Deref;

/// 8-bit RGBA, not premultiplied. This is the narrow pixel format used everywhere in the pipeline.
pub type RGBA = rgb::RGBA<u8>;

/// 16-bit-per-channel RGBA, as decoded from 16-bit PNGs
pub type RGBA16 = rgb::RGBA<u16>;

/// Palette index. Every index buffer refers into a [`Palette`] of at most 256 colors.
pub type PalIndex = u8;

pub const MAX_COLORS: usize = 256;

/// Ordered list of up to 256 colors
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Palette {
    entries: ArrayVec<RGBA, MAX_COLORS>,
}

impl Palette {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { entries: ArrayVec::new() }
    }

    /// Fails if there are more than 256 colors
    pub fn from_slice(colors: &[RGBA]) -> Result<Self, Error> {
        if colors.len() > MAX_COLORS {
            return Err(Error::TooManyColors(colors.len()));
        }
        Ok(Self { entries: colors.iter().copied().collect() })
    }

    /// Appends a color, returns its index
    pub fn push(&mut self, color: RGBA) -> Result<PalIndex, Error> {
        let index = self.entries.len();
        self.entries.try_push(color).map_err(|_| Error::TooManyColors(MAX_COLORS + 1))?;
        Ok(index as PalIndex)
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[RGBA] {
        &self.entries
    }

    /// Color for the index, or `None` if it's past the end of the palette
    #[inline]
    #[must_use]
    pub fn get(&self, index: PalIndex) -> Option<RGBA> {
        self.entries.get(usize::from(index)).copied()
    }

    /// Errors on the first index that doesn't point into the palette
    pub fn check_indices(&self, indices: &[PalIndex]) -> Result<(), Error> {
        let len = self.entries.len();
        match indices.iter().find(|&&i| usize::from(i) >= len) {
            Some(&index) => Err(Error::IndexOutOfPalette { index, len }),
            None => Ok(()),
        }
    }

    /// Replaces every index with its color
    pub fn resolve(&self, indices: &[PalIndex]) -> Result<Vec<RGBA>, Error> {
        self.check_indices(indices)?;
        let mut out = Vec::new();
        out.try_reserve_exact(indices.len())?;
        out.extend(indices.iter().map(|&i| self.entries[usize::from(i)]));
        Ok(out)
    }
}

impl Deref for Palette {
    type Target = [RGBA];

    #[inline(always)]
    fn deref(&self) -> &[RGBA] {
        &self.entries
    }
}

/// Palette plus a grid of indices into it.
///
/// All indices are guaranteed to be smaller than the palette length.
#[derive(Clone, Debug)]
pub struct IndexedImage {
    palette: Palette,
    indices: ImgVec<PalIndex>,
}

impl IndexedImage {
    /// Validates that every index points into the palette
    pub fn new(palette: Palette, indices: ImgVec<PalIndex>) -> Result<Self, Error> {
        let indices = if indices.stride() == indices.width() && indices.buf().len() == indices.width() * indices.height() {
            indices
        } else {
            let (buf, width, height) = indices.as_ref().to_contiguous_buf();
            ImgVec::new(buf.into_owned(), width, height)
        };
        palette.check_indices(indices.buf())?;
        Ok(Self { palette, indices })
    }

    /// Caller guarantees the indices came from an image that was already checked against this palette
    pub(crate) fn from_checked_parts(palette: Palette, indices: ImgVec<PalIndex>) -> Self {
        debug_assert!(palette.check_indices(indices.buf()).is_ok());
        Self { palette, indices }
    }

    #[inline]
    #[must_use]
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    #[inline]
    #[must_use]
    pub fn indices(&self) -> ImgRef<'_, PalIndex> {
        self.indices.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.indices.width()
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.indices.height()
    }

    /// Row-major indices without stride padding
    #[inline]
    pub(crate) fn flat_indices(&self) -> &[PalIndex] {
        self.indices.buf()
    }

    #[must_use]
    pub fn into_parts(self) -> (Palette, ImgVec<PalIndex>) {
        (self.palette, self.indices)
    }

    /// Full-color copy of the image
    pub fn to_rgba(&self) -> Result<ImgVec<RGBA>, Error> {
        Ok(ImgVec::new(self.palette.resolve(self.flat_indices())?, self.width(), self.height()))
    }
}

#[test]
fn palette_limits() {
    let colors = vec![RGBA::new(1, 2, 3, 4); 257];
    assert!(matches!(Palette::from_slice(&colors), Err(Error::TooManyColors(257))));

    let mut pal = Palette::from_slice(&colors[..256]).unwrap();
    assert_eq!(256, pal.len());
    assert!(pal.push(RGBA::new(0, 0, 0, 0)).is_err());

    let mut pal = Palette::new();
    assert_eq!(0, pal.push(RGBA::new(9, 9, 9, 255)).unwrap());
    assert_eq!(1, pal.push(RGBA::new(0, 0, 0, 0)).unwrap());
    assert_eq!(Some(RGBA::new(0, 0, 0, 0)), pal.get(1));
    assert_eq!(None, pal.get(2));
}

#[test]
fn indices_are_checked() {
    let pal = Palette::from_slice(&[RGBA::new(0, 0, 0, 255), RGBA::new(255, 255, 255, 255)]).unwrap();
    let err = IndexedImage::new(pal.clone(), ImgVec::new(vec![0, 1, 2, 0], 2, 2)).unwrap_err();
    assert!(matches!(err, Error::IndexOutOfPalette { index: 2, len: 2 }));

    let img = IndexedImage::new(pal, ImgVec::new(vec![0, 1, 1, 0], 2, 2)).unwrap();
    let rgba = img.to_rgba().unwrap();
    assert_eq!(RGBA::new(255, 255, 255, 255), rgba.buf()[1]);
    assert_eq!(RGBA::new(0, 0, 0, 255), rgba.buf()[3]);
}
