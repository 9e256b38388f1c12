//! 16-bit to 8-bit channel reduction

use crate::error::Error;
use crate::pal::{RGBA, RGBA16};
use imgref::{ImgRef, ImgVec};
use rgb::ComponentMap;

/// Accumulated error per channel, in 1/16ths of a 16-bit step
type ChannelErrors = [i32; 4];

/// Reduces 16-bit channels to 8 bits with Floyd-Steinberg error diffusion.
///
/// Each channel (alpha included) is diffused independently, in raster order, with integer
/// arithmetic only, so the output is bit-exact for a given input.
pub fn diffuse(wide: ImgRef<'_, RGBA16>) -> Result<ImgVec<RGBA>, Error> {
    let width = wide.width();
    let height = wide.height();
    if width == 0 || height == 0 {
        return Err(Error::EmptyImage);
    }

    let errwidth = width + 2; // +2 saves from checking out of bounds access
    let mut err_data: Vec<ChannelErrors> = Vec::new();
    err_data.try_reserve_exact(errwidth * 2)?;
    err_data.resize(errwidth * 2, [0; 4]);
    let (mut thiserr, mut nexterr) = err_data.split_at_mut(errwidth);

    let mut out = Vec::new();
    out.try_reserve_exact(width * height)?;

    for row in wide.rows() {
        for (x, px) in row.iter().enumerate() {
            let src = [px.r, px.g, px.b, px.a];
            let mut dst = [0u8; 4];
            for c in 0..4 {
                let value = (i32::from(src[c]) + thiserr[x + 1][c] / 16).clamp(0, 0xFFFF);
                dst[c] = (value >> 8) as u8;
                let residual = value - (i32::from(dst[c]) << 8);
                nexterr[x][c] += 3 * residual;
                nexterr[x + 1][c] += 5 * residual;
                nexterr[x + 2][c] += residual;
                thiserr[x + 2][c] += 7 * residual;
            }
            out.push(RGBA::new(dst[0], dst[1], dst[2], dst[3]));
        }
        std::mem::swap(&mut thiserr, &mut nexterr);
        nexterr.fill([0; 4]);
    }

    Ok(ImgVec::new(out, width, height))
}

/// Drops the low byte of every channel
pub fn truncate(wide: ImgRef<'_, RGBA16>) -> Result<ImgVec<RGBA>, Error> {
    if wide.width() == 0 || wide.height() == 0 {
        return Err(Error::EmptyImage);
    }
    let mut out = Vec::new();
    out.try_reserve_exact(wide.width() * wide.height())?;
    out.extend(wide.pixels().map(|px| px.map(|c| (c >> 8) as u8)));
    Ok(ImgVec::new(out, wide.width(), wide.height()))
}

#[cfg(test)]
fn gray16(value: u16, width: usize, height: usize) -> ImgVec<RGBA16> {
    ImgVec::new(vec![RGBA16::new(value, value, value, 0xFFFF); width * height], width, height)
}

#[test]
fn exact_values_stay_exact() {
    let out = diffuse(gray16(0x4000, 7, 5).as_ref()).unwrap();
    assert!(out.buf().iter().all(|&px| px == RGBA::new(0x40, 0x40, 0x40, 0xFF)));
}

#[test]
fn error_goes_right() {
    let img = ImgVec::new(vec![RGBA16::new(0x0180, 0, 0, 0), RGBA16::new(0x0100, 0, 0, 0)], 2, 1);
    let out = diffuse(img.as_ref()).unwrap();
    // residual 0x80 of the first pixel; 7/16 of it is carried to the second one
    assert_eq!(1, out.buf()[0].r);
    assert_eq!(1, out.buf()[1].r);

    let img = ImgVec::new(vec![RGBA16::new(0x01F0, 0, 0, 0), RGBA16::new(0x01F0, 0, 0, 0)], 2, 1);
    let out = diffuse(img.as_ref()).unwrap();
    // 0x1F0 + 0xF0 * 7 / 16 = 0x259
    assert_eq!(1, out.buf()[0].r);
    assert_eq!(2, out.buf()[1].r);
}

#[test]
fn error_goes_down() {
    let img = ImgVec::new(vec![RGBA16::new(0, 0x00F0, 0, 0), RGBA16::new(0, 0x00F0, 0, 0)], 1, 2);
    let out = diffuse(img.as_ref()).unwrap();
    // 5/16 of 0xF0 lands below: 0xF0 + 0x4B
    assert_eq!(0, out.buf()[0].g);
    assert_eq!(1, out.buf()[1].g);
}

#[test]
fn clamps_at_white() {
    let img = gray16(0xFFFF, 9, 9);
    let out = diffuse(img.as_ref()).unwrap();
    assert!(out.buf().iter().all(|&px| px == RGBA::new(255, 255, 255, 255)));
}

#[test]
fn deterministic() {
    let pixels: Vec<_> = (0..40 * 30u32).map(|n| RGBA16::new((n * 977) as u16, (n * 31) as u16, (n * 7919) as u16, (n * 13) as u16)).collect();
    let img = ImgVec::new(pixels, 40, 30);
    let a = diffuse(img.as_ref()).unwrap();
    let b = diffuse(img.as_ref()).unwrap();
    assert_eq!(a.buf(), b.buf());
}

#[test]
fn brightness_is_preserved() {
    let img = gray16(0x8080, 32, 32);
    let dithered = diffuse(img.as_ref()).unwrap();
    let truncated = truncate(img.as_ref()).unwrap();

    let mean = |img: &ImgVec<RGBA>| img.buf().iter().map(|px| u64::from(px.r) << 8).sum::<u64>() as f64 / 1024.;
    let target = f64::from(0x8080);
    assert!((mean(&dithered) - target).abs() < 64., "{}", mean(&dithered));
    assert!((mean(&dithered) - target).abs() < (mean(&truncated) - target).abs());
    assert!(dithered.buf().iter().any(|px| px.r == 0x80));
    assert!(dithered.buf().iter().any(|px| px.r == 0x81));
}
