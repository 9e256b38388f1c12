//! Palette remapping: full-color pixels to at most 256 colors and one index per pixel.

use crate::attr::QuantizeOptions;
use crate::error::Error;
use crate::pal::{IndexedImage, Palette, RGBA};
use imgref::{ImgRef, ImgVec};

/// Builds a palette for an image and remaps the image to it
pub trait Quantizer {
    /// The result must have the same dimensions as `pixels` and at most `options.max_colors` colors
    fn quantize(&self, pixels: ImgRef<'_, RGBA>, options: &QuantizeOptions) -> Result<IndexedImage, Error>;
}

/// libimagequant, with dithering and default quality settings
#[derive(Copy, Clone, Debug, Default)]
pub struct Imagequant;

impl Quantizer for Imagequant {
    fn quantize(&self, pixels: ImgRef<'_, RGBA>, options: &QuantizeOptions) -> Result<IndexedImage, Error> {
        let (width, height) = (pixels.width(), pixels.height());
        if width == 0 || height == 0 {
            return Err(Error::EmptyImage);
        }

        let mut liq = imagequant::new();
        liq.set_speed(options.speed.into())?;
        liq.set_max_colors(options.max_colors)?;

        // sRGB
        let mut img = liq.new_image_stride(*pixels.buf(), width, height, pixels.stride(), 0.)?;
        let mut res = liq.quantize(&mut img)?;
        let (colors, indices) = res.remapped(&mut img)?;

        if indices.len() != width * height {
            return Err(Error::BufferSizeMismatch { len: indices.len(), width, height });
        }
        IndexedImage::new(Palette::from_slice(&colors)?, ImgVec::new(indices, width, height))
    }
}

#[cfg(test)]
fn gradient(width: usize, height: usize) -> ImgVec<RGBA> {
    let px = (0..width * height).map(|n| {
        let (x, y) = (n % width, n / width);
        RGBA::new((x * 255 / width) as u8, (y * 255 / height) as u8, ((x + y) % 256) as u8, 255)
    }).collect();
    ImgVec::new(px, width, height)
}

#[test]
fn palette_limit() {
    let img = gradient(64, 48);
    for max_colors in [255, 256, 16] {
        let out = Imagequant.quantize(img.as_ref(), &QuantizeOptions { max_colors, speed: 10 }).unwrap();
        assert_eq!((64, 48), (out.width(), out.height()));
        assert!(out.palette().len() <= max_colors as usize);
        assert!(out.indices().buf().iter().all(|&i| usize::from(i) < out.palette().len()));
    }
}

#[test]
fn few_colors_stay_close() {
    let colors = [RGBA::new(255, 0, 0, 255), RGBA::new(0, 0, 255, 255), RGBA::new(20, 200, 20, 255)];
    let px: Vec<_> = (0..30 * 20).map(|n| colors[(n / 7) % 3]).collect();
    let img = ImgVec::new(px, 30, 20);
    let out = Imagequant.quantize(img.as_ref(), &QuantizeOptions { max_colors: 255, speed: 1 }).unwrap();
    let rgba = out.to_rgba().unwrap();
    for (a, b) in img.buf().iter().zip(rgba.buf()) {
        assert!(a.r.abs_diff(b.r) <= 4 && a.g.abs_diff(b.g) <= 4 && a.b.abs_diff(b.b) <= 4, "{a:?} {b:?}");
    }
}

#[test]
fn strided_input() {
    let img = gradient(20, 10);
    let sub = img.sub_image(2, 1, 15, 8);
    let out = Imagequant.quantize(sub, &QuantizeOptions { max_colors: 256, speed: 10 }).unwrap();
    assert_eq!((15, 8), (out.width(), out.height()));
}

#[test]
fn bad_options() {
    let img = gradient(4, 4);
    assert!(matches!(Imagequant.quantize(img.as_ref(), &QuantizeOptions { max_colors: 1, speed: 1 }), Err(Error::Quantize(_))));
    assert!(matches!(Imagequant.quantize(img.as_ref(), &QuantizeOptions { max_colors: 256, speed: 0 }), Err(Error::Quantize(_))));
}
