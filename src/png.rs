//! PNG adapter. Decoding keeps whatever the file has: 16-bit color, 8-bit color, or palette indices.

use crate::error::Error;
use crate::optimize::RasterEncoder;
use crate::pal::{IndexedImage, PalIndex, Palette, RGBA, RGBA16};
use imgref::{ImgRef, ImgVec};
use lodepng::ColorType;
use rgb::ComponentMap;

/// Pixels as stored in the file
#[derive(Clone, Debug)]
pub enum Decoded {
    /// 16 bits per channel
    Wide(ImgVec<RGBA16>),
    /// 8 bits per channel or less, expanded to RGBA
    Narrow(ImgVec<RGBA>),
    /// Palette image
    Indexed(IndexedImage),
}

impl Decoded {
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Self::Wide(img) => img.width(),
            Self::Narrow(img) => img.width(),
            Self::Indexed(img) => img.width(),
        }
    }

    #[must_use]
    pub fn height(&self) -> usize {
        match self {
            Self::Wide(img) => img.height(),
            Self::Narrow(img) => img.height(),
            Self::Indexed(img) => img.height(),
        }
    }

    /// 16-bit color loses its low byte, palette indices are resolved
    pub fn into_narrow(self) -> Result<ImgVec<RGBA>, Error> {
        match self {
            Self::Wide(img) => crate::dither::truncate(img.as_ref()),
            Self::Narrow(img) => Ok(img),
            Self::Indexed(img) => img.to_rgba(),
        }
    }

    /// For log messages
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Wide(img) => format!("{}x{} 16-bit RGBA", img.width(), img.height()),
            Self::Narrow(img) => format!("{}x{} 8-bit RGBA", img.width(), img.height()),
            Self::Indexed(img) => format!("{}x{} indexed, {} colors", img.width(), img.height(), img.palette().len()),
        }
    }
}

pub fn decode(data: &[u8]) -> Result<Decoded, Error> {
    let mut dec = lodepng::Decoder::new();
    dec.color_convert(false);
    let raw = dec.decode(data)?;
    let color = &dec.info_png().color;

    if color.colortype == ColorType::PALETTE {
        let lodepng::Image::RawData(bitmap) = raw else {
            return Err(Error::Unsupported);
        };
        let palette = Palette::from_slice(color.palette())?;
        let indices = unpack(&bitmap.buffer, color.bitdepth(), bitmap.width * bitmap.height)?;
        let indices = ImgVec::new(indices, bitmap.width, bitmap.height);
        return Ok(Decoded::Indexed(IndexedImage::new(palette, indices)?));
    }

    if color.bitdepth() == 16 {
        return match lodepng::decode_memory(data, ColorType::RGBA, 16)? {
            // samples are stored big-endian, lodepng hands them over as they are
            lodepng::Image::RGBA16(mut bitmap) => {
                for px in &mut bitmap.buffer {
                    *px = px.map(u16::from_be);
                }
                Ok(Decoded::Wide(ImgVec::new(bitmap.buffer, bitmap.width, bitmap.height)))
            },
            _ => Err(Error::Unsupported),
        };
    }

    let bitmap = lodepng::decode32(data)?;
    Ok(Decoded::Narrow(ImgVec::new(bitmap.buffer, bitmap.width, bitmap.height)))
}

/// Always an 8-bit RGBA PNG, never converted to a palette
pub fn encode_rgba(img: ImgRef<'_, RGBA>) -> Result<Vec<u8>, Error> {
    let (buf, width, height) = img.to_contiguous_buf();
    let mut enc = lodepng::Encoder::new();
    enc.set_auto_convert(false);
    set_rgba_mode(enc.info_raw_mut());
    set_rgba_mode(&mut enc.info_png_mut().color);
    Ok(enc.encode(&*buf, width, height)?)
}

fn set_rgba_mode(mode: &mut lodepng::ColorMode) {
    mode.colortype = ColorType::RGBA;
    mode.set_bitdepth(8);
}

/// Palette PNG with the smallest bit depth that fits the palette
pub fn encode_indexed(indices: ImgRef<'_, PalIndex>, palette: &Palette) -> Result<Vec<u8>, Error> {
    if palette.is_empty() {
        return Err(Error::NotPaletted);
    }
    let (buf, width, height) = indices.to_contiguous_buf();
    palette.check_indices(&buf)?;
    let depth = bit_depth(palette.len());
    let packed = pack(&buf, depth)?;

    let mut enc = lodepng::Encoder::new();
    enc.set_auto_convert(false);
    set_palette_mode(enc.info_raw_mut(), depth, palette)?;
    set_palette_mode(&mut enc.info_png_mut().color, depth, palette)?;
    Ok(enc.encode(&packed, width, height)?)
}

fn set_palette_mode(mode: &mut lodepng::ColorMode, depth: u32, palette: &Palette) -> Result<(), Error> {
    mode.colortype = ColorType::PALETTE;
    mode.set_bitdepth(depth);
    mode.palette_clear();
    for &color in palette.iter() {
        mode.palette_add(color)?;
    }
    Ok(())
}

/// Writes palette PNGs; this is what the width search minimizes
#[derive(Copy, Clone, Debug, Default)]
pub struct PngEncoder;

impl RasterEncoder for PngEncoder {
    fn encode(&self, indices: ImgRef<'_, PalIndex>, palette: &Palette) -> Result<Vec<u8>, Error> {
        encode_indexed(indices, palette)
    }
}

fn bit_depth(colors: usize) -> u32 {
    match colors {
        0..=2 => 1,
        3..=4 => 2,
        5..=16 => 4,
        _ => 8,
    }
}

/// Packs indices MSB first, without padding at the end of rows
fn pack(indices: &[PalIndex], depth: u32) -> Result<Vec<u8>, Error> {
    if depth == 8 {
        return Ok(indices.to_vec());
    }
    let per_byte = (8 / depth) as usize;
    let mut out = Vec::new();
    out.try_reserve_exact((indices.len() + per_byte - 1) / per_byte)?;
    out.extend(indices.chunks(per_byte).map(|chunk| {
        chunk.iter().enumerate().fold(0u8, |byte, (n, &i)| {
            byte | (i << (8 - depth as usize * (n + 1)))
        })
    }));
    Ok(out)
}

fn unpack(packed: &[u8], depth: u32, len: usize) -> Result<Vec<PalIndex>, Error> {
    let (per_byte, mask) = match depth {
        8 => (1, 0xFF),
        4 => (2, 0x0F),
        2 => (4, 0x03),
        1 => (8, 0x01),
        _ => return Err(Error::Unsupported),
    };
    if packed.len() * per_byte < len {
        return Err(Error::BufferSizeMismatch { len: packed.len() * per_byte, width: len, height: 1 });
    }
    let mut out = Vec::new();
    out.try_reserve_exact(len)?;
    out.extend(packed.iter()
        .flat_map(|&byte| (0..per_byte).map(move |n| (byte >> (8 - depth as usize * (n + 1))) & mask))
        .take(len));
    Ok(out)
}

#[test]
fn packing() {
    assert_eq!(vec![0b1011_0000], pack(&[1, 0, 1, 1], 1).unwrap());
    assert_eq!(vec![0b1110_0100, 0b1100_0000], pack(&[3, 2, 1, 0, 3], 2).unwrap());
    assert_eq!(vec![0xF1, 0x20], pack(&[15, 1, 2], 4).unwrap());
    assert_eq!(vec![3, 2, 1, 0, 3], unpack(&[0b1110_0100, 0b1100_0000], 2, 5).unwrap());
    assert_eq!(vec![15, 1, 2], unpack(&[0xF1, 0x20], 4, 3).unwrap());
    assert!(unpack(&[0xFF], 1, 9).is_err());

    assert_eq!(1, bit_depth(2));
    assert_eq!(2, bit_depth(3));
    assert_eq!(4, bit_depth(16));
    assert_eq!(8, bit_depth(17));
}

#[test]
fn indexed_round_trip() {
    for colors in [2u8, 3, 11, 200] {
        let palette = Palette::from_slice(&(0..colors).map(|n| RGBA::new(n, 255 - n, n / 2, 255 - n % 3)).collect::<Vec<_>>()).unwrap();
        // odd width, so rows don't end on a byte boundary at low bit depths
        let indices = ImgVec::new((0..7 * 5).map(|n| (n * 7 % usize::from(colors)) as u8).collect(), 7, 5);
        let png = encode_indexed(indices.as_ref(), &palette).unwrap();
        let Decoded::Indexed(img) = decode(&png).unwrap() else { panic!("not indexed") };
        assert_eq!(&palette, img.palette());
        assert_eq!(indices.buf(), img.indices().buf());
    }
}

#[cfg(test)]
fn png16(samples: &[u16], colortype: ColorType, width: usize, height: usize) -> Vec<u8> {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_be_bytes()).collect();
    let mut enc = lodepng::Encoder::new();
    enc.set_auto_convert(false);
    enc.info_raw_mut().colortype = colortype;
    enc.info_raw_mut().set_bitdepth(16);
    enc.info_png_mut().color.colortype = colortype;
    enc.info_png_mut().color.set_bitdepth(16);
    enc.encode(&bytes, width, height).unwrap()
}

#[test]
fn narrow_and_wide() {
    let px: Vec<RGBA> = (0..12).map(|n| RGBA::new(n * 20, 7, 255 - n, 200)).collect();
    let png = encode_rgba(ImgRef::new(&px, 4, 3)).unwrap();
    let decoded = decode(&png).unwrap();
    assert!(matches!(decoded, Decoded::Narrow(_)));
    assert_eq!((4, 3), (decoded.width(), decoded.height()));
    assert_eq!(&px[..], decoded.into_narrow().unwrap().buf());

    let samples = [0x1234, 0x5678, 0x9ABC, 0xFFFE, 0x0102, 0xA0B0, 0x00FF, 0xFF00];
    let png = png16(&samples, ColorType::RGBA, 2, 1);
    let Decoded::Wide(img) = decode(&png).unwrap() else { panic!("not 16-bit") };
    assert_eq!(&[RGBA16::new(0x1234, 0x5678, 0x9ABC, 0xFFFE), RGBA16::new(0x0102, 0xA0B0, 0x00FF, 0xFF00)][..], &img.buf()[..]);
    assert_eq!(RGBA::new(0x12, 0x56, 0x9A, 0xFF), Decoded::Wide(img).into_narrow().unwrap().buf()[0]);

    let Decoded::Wide(gray) = decode(&png16(&[0x1234], ColorType::GREY, 1, 1)).unwrap() else { panic!("not 16-bit") };
    assert_eq!(RGBA16::new(0x1234, 0x1234, 0x1234, 0xFFFF), gray.buf()[0]);
}

#[test]
fn few_colors_stay_rgba() {
    let px = [RGBA::new(255, 0, 0, 255), RGBA::new(0, 0, 255, 255)].repeat(3);
    let png = encode_rgba(ImgRef::new(&px, 3, 2)).unwrap();
    let decoded = decode(&png).unwrap();
    assert!(matches!(decoded, Decoded::Narrow(_)), "{}", decoded.describe());
    assert_eq!(&px[..], decoded.into_narrow().unwrap().buf());
}

#[test]
fn empty_palette() {
    let indices = ImgVec::new(vec![0u8; 4], 2, 2);
    assert!(matches!(encode_indexed(indices.as_ref(), &Palette::new()), Err(Error::NotPaletted)));
}
