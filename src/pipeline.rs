use crate::attr::{Attributes, Layout};
use crate::dither;
use crate::error::Error;
use crate::frames::FrameGeometry;
use crate::optimize::{self, Candidate, RasterEncoder};
use crate::pal::{IndexedImage, RGBA, RGBA16};
use crate::png::Decoded;
use crate::remap::{Imagequant, Quantizer};
use crate::sequence;
use crate::stream;
use imgref::{ImgRef, ImgVec};

/// Every conversion the tool does, from decoded images to encoded layouts and back.
///
/// Nothing here touches the file system. Geometry is validated before any quantization or
/// large allocation.
#[derive(Clone, Debug)]
pub struct Pipeline<Q: Quantizer = Imagequant> {
    attr: Attributes,
    quantizer: Q,
}

impl Pipeline {
    /// Uses libimagequant for palette generation
    #[must_use]
    pub fn new(attr: Attributes) -> Self {
        Self::with_quantizer(attr, Imagequant)
    }
}

impl<Q: Quantizer> Pipeline<Q> {
    #[must_use]
    pub fn with_quantizer(attr: Attributes, quantizer: Q) -> Self {
        Self { attr, quantizer }
    }

    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attr
    }

    /// 8-bit copy of 16-bit input, error-diffused or truncated as configured.
    /// Anything else doesn't need it and gives `None`.
    pub fn diffuse(&self, decoded: &Decoded) -> Result<Option<ImgVec<RGBA>>, Error> {
        match decoded {
            Decoded::Wide(img) => self.reduce(img.as_ref()).map(Some),
            _ => Ok(None),
        }
    }

    /// 8-bit RGBA of any input. 16-bit input is diffused or truncated, as configured.
    pub fn narrow(&self, decoded: Decoded) -> Result<ImgVec<RGBA>, Error> {
        match decoded {
            Decoded::Wide(img) => self.reduce(img.as_ref()),
            other => other.into_narrow(),
        }
    }

    fn reduce(&self, wide: ImgRef<'_, RGBA16>) -> Result<ImgVec<RGBA>, Error> {
        if self.attr.diffuse_wide() {
            self.attr.verbose_print(format!("  diffusing {}x{} 16-bit RGBA", wide.width(), wide.height()));
            dither::diffuse(wide)
        } else {
            self.attr.verbose_print("  truncating 16-bit RGBA");
            dither::truncate(wide)
        }
    }

    /// Palette image with room for `layout`'s colors.
    ///
    /// Palette input that already fits is returned as-is; it's never quantized twice.
    pub fn quantize(&self, decoded: Decoded, layout: Layout) -> Result<IndexedImage, Error> {
        let options = self.attr.quantize_options(layout);
        if let Decoded::Indexed(img) = decoded {
            if img.palette().len() <= options.max_colors as usize {
                self.attr.verbose_print(format!("  keeping the {} colors of the input palette", img.palette().len()));
                return Ok(img);
            }
            return self.quantize(Decoded::Narrow(img.to_rgba()?), layout);
        }

        let pixels = self.narrow(decoded)?;
        let (width, height) = (pixels.width(), pixels.height());
        if width == 0 || height == 0 {
            return Err(Error::EmptyImage);
        }
        let img = self.quantizer.quantize(pixels.as_ref(), &options)?;
        if (img.width(), img.height()) != (width, height) {
            return Err(Error::BufferSizeMismatch { len: img.width() * img.height(), width, height });
        }
        if img.palette().len() > options.max_colors as usize {
            return Err(Error::TooManyColors(img.palette().len()));
        }
        self.attr.verbose_print(format!("  quantized to {} colors", img.palette().len()));
        Ok(img)
    }

    /// Full-color copy of any input, palette input resolved
    pub fn unquantize(&self, decoded: Decoded) -> Result<ImgVec<RGBA>, Error> {
        self.narrow(decoded)
    }

    /// Vertical strip of `frame_count` frames to the sequence layout
    pub fn encode_sequence(&self, decoded: Decoded, frame_count: usize) -> Result<IndexedImage, Error> {
        let geometry = FrameGeometry::from_strip(decoded.width(), decoded.height(), frame_count)?;
        self.log_geometry(&geometry);
        let strip = self.quantize(decoded, Layout::Sequence)?;
        sequence::encode(&strip, frame_count)
    }

    pub fn decode_sequence(&self, decoded: &Decoded, frame_count: usize) -> Result<ImgVec<RGBA>, Error> {
        let Decoded::Indexed(img) = decoded else {
            return Err(Error::NotPaletted);
        };
        let geometry = FrameGeometry::from_sequence(img.width(), img.height(), frame_count)?;
        self.log_geometry(&geometry);
        sequence::decode(img, frame_count)
    }

    /// Vertical strip to the stream layout, then the width search.
    ///
    /// Returns every strictly smaller candidate in the order found; the last one is the best.
    pub fn encode_stream<E: RasterEncoder>(&self, decoded: Decoded, frame_count: usize, encoder: &E) -> Result<Vec<Candidate>, Error> {
        let geometry = FrameGeometry::from_strip(decoded.width(), decoded.height(), frame_count)?;
        self.log_geometry(&geometry);
        let strip = self.quantize(decoded, Layout::Stream)?;
        let stream = stream::encode(&strip, frame_count)?;
        optimize::search(&self.attr, &stream, encoder)
    }

    /// Stream image of any shape back to a full-color vertical strip.
    ///
    /// With `frame_count`, up to one row of padding at the end of the image is accepted.
    pub fn decode_stream(&self, decoded: &Decoded, frame_width: usize, frame_height: usize, frame_count: Option<usize>) -> Result<ImgVec<RGBA>, Error> {
        let Decoded::Indexed(img) = decoded else {
            return Err(Error::NotPaletted);
        };
        let geometry = match frame_count {
            Some(frame_count) => FrameGeometry::from_padded_stream(img.width(), img.height(), frame_width, frame_height, frame_count)?,
            None => FrameGeometry::from_stream(img.width(), img.height(), frame_width, frame_height)?,
        };
        self.log_geometry(&geometry);
        stream::decode_frames(img, &geometry)
    }

    fn log_geometry(&self, geometry: &FrameGeometry) {
        self.attr.verbose_print(format!("  {} frames of {}x{}", geometry.frame_count(), geometry.frame_width(), geometry.frame_height()));
    }
}

#[cfg(test)]
mod test_quantizer {
    use crate::attr::QuantizeOptions;
    use crate::error::Error;
    use crate::pal::{IndexedImage, Palette, RGBA};
    use crate::remap::Quantizer;
    use imgref::{ImgRef, ImgVec};
    use std::cell::Cell;

    /// Assigns palette entries in order of first appearance, and counts calls
    #[derive(Default)]
    pub(super) struct FirstSeen {
        pub calls: Cell<usize>,
    }

    impl Quantizer for FirstSeen {
        fn quantize(&self, pixels: ImgRef<'_, RGBA>, options: &QuantizeOptions) -> Result<IndexedImage, Error> {
            self.calls.set(self.calls.get() + 1);
            let mut palette = Palette::new();
            let mut indices = Vec::new();
            for px in pixels.pixels() {
                let index = match palette.iter().position(|&c| c == px) {
                    Some(i) => i as u8,
                    None if palette.len() < options.max_colors as usize => palette.push(px)?,
                    None => return Err(Error::TooManyColors(palette.len() + 1)),
                };
                indices.push(index);
            }
            IndexedImage::new(palette, ImgVec::new(indices, pixels.width(), pixels.height()))
        }
    }
}

#[cfg(test)]
fn test_strip(frames: usize, width: usize, height: usize) -> Decoded {
    let px = (0..frames * width * height).map(|n| RGBA::new((n % 5) as u8 * 50, (n / width % 3) as u8, 9, 255)).collect();
    Decoded::Narrow(ImgVec::new(px, width, frames * height))
}

#[test]
fn sequence_through_pipeline() {
    let p = Pipeline::with_quantizer(Attributes::new(), test_quantizer::FirstSeen::default());
    let strip = test_strip(4, 10, 8);
    let Decoded::Narrow(original) = strip.clone() else { unreachable!() };

    let seq = p.encode_sequence(strip, 4).unwrap();
    assert_eq!((40, 8), (seq.width(), seq.height()));
    let back = p.decode_sequence(&Decoded::Indexed(seq), 4).unwrap();
    assert_eq!(original.buf(), back.buf());
}

#[test]
fn validates_before_quantizing() {
    let p = Pipeline::with_quantizer(Attributes::new(), test_quantizer::FirstSeen::default());
    assert!(matches!(p.encode_sequence(test_strip(3, 4, 3), 2), Err(Error::HeightNotDivisible { height: 9, frames: 2 })));
    assert!(matches!(p.encode_stream(test_strip(3, 4, 3), 0, &crate::png::PngEncoder), Err(Error::InvalidFrameCount(0))));
    assert_eq!(0, p.quantizer.calls.get());
    assert!(matches!(p.decode_sequence(&test_strip(1, 2, 2), 1), Err(Error::NotPaletted)));
}

#[test]
fn indexed_input_is_kept() {
    let p = Pipeline::with_quantizer(Attributes::new(), test_quantizer::FirstSeen::default());
    let Decoded::Narrow(px) = test_strip(2, 3, 2) else { unreachable!() };
    let indexed = p.quantizer.quantize(px.as_ref(), &p.attr.quantize_options(Layout::Stream)).unwrap();
    let kept = p.quantize(Decoded::Indexed(indexed.clone()), Layout::Stream).unwrap();
    assert_eq!(indexed.indices().buf(), kept.indices().buf());
    assert_eq!(1, p.quantizer.calls.get());
}

#[test]
fn full_palette_is_requantized_for_stream() {
    use crate::pal::Palette;

    let p = Pipeline::with_quantizer(Attributes::new(), test_quantizer::FirstSeen::default());
    let palette = Palette::from_slice(&(0..=255u8).map(|n| RGBA::new(n, n, n, 255)).collect::<Vec<_>>()).unwrap();
    // only 4 of the 256 colors are used
    let indices = ImgVec::new((0..16).map(|n| (n % 4) as u8).collect(), 4, 4);
    let img = IndexedImage::new(palette, indices).unwrap();

    let seq = p.quantize(Decoded::Indexed(img.clone()), Layout::Sequence).unwrap();
    assert_eq!(256, seq.palette().len());
    let stream = p.quantize(Decoded::Indexed(img), Layout::Stream).unwrap();
    assert_eq!(4, stream.palette().len());
    assert_eq!(1, p.quantizer.calls.get());
}

#[test]
fn wide_input() {
    let wide = Decoded::Wide(ImgVec::new(vec![RGBA16::new(0x80FF, 0x1000, 0xFFFF, 0xFFFF); 6], 3, 2));
    let mut attr = Attributes::new();
    let p = Pipeline::with_quantizer(attr.clone(), test_quantizer::FirstSeen::default());
    let diffused = p.diffuse(&wide).unwrap().unwrap();
    assert!(diffused.buf().iter().any(|px| px.r == 0x81));
    assert!(p.diffuse(&test_strip(1, 2, 2)).unwrap().is_none());

    attr.set_diffuse_wide(false);
    let p = Pipeline::with_quantizer(attr, test_quantizer::FirstSeen::default());
    let truncated = p.diffuse(&wide).unwrap().unwrap();
    assert!(truncated.buf().iter().all(|&px| px == RGBA::new(0x80, 0x10, 0xFF, 0xFF)));
    let narrow = p.narrow(wide).unwrap();
    assert_eq!(truncated.buf(), narrow.buf());
}

#[test]
fn stream_with_padding() {
    let p = Pipeline::with_quantizer(Attributes::new(), test_quantizer::FirstSeen::default());
    let strip = test_strip(4, 10, 8);
    let Decoded::Narrow(original) = strip.clone() else { unreachable!() };
    let candidates = p.encode_stream(strip, 4, &crate::png::PngEncoder).unwrap();
    let best = candidates.last().unwrap();

    let Decoded::Indexed(raster) = crate::png::decode(&best.encoded).unwrap() else { panic!("not indexed") };
    assert_eq!((best.width, best.height), (raster.width(), raster.height()));
    let frames = if best.wasted == 0 { None } else { Some(4) };
    let back = p.decode_stream(&Decoded::Indexed(raster), 10, 8, frames).unwrap();
    assert_eq!(original.buf(), back.buf());
}
