#![feature(test)]

extern crate test;
use imgref::ImgVec;
use test::Bencher;

use pixelsequencer::*;

fn wide_strip(width: usize, height: usize) -> ImgVec<RGBA16> {
    let px = (0..width * height).map(|n| {
        let (x, y) = ((n % width) as u16, (n / width) as u16);
        RGBA16::new(x.wrapping_mul(331), y.wrapping_mul(797), (x ^ y).wrapping_mul(113), 0xFFFF)
    }).collect();
    ImgVec::new(px, width, height)
}

fn indexed_strip(frames: usize, width: usize, height: usize) -> IndexedImage {
    let palette = Palette::from_slice(&(0..=254u8).map(|n| RGBA::new(n, n / 2, 255 - n, 255)).collect::<Vec<_>>()).unwrap();
    let indices = (0..frames * width * height).map(|n| {
        let (f, i) = (n / (width * height), n % (width * height));
        ((i / 7 + f / 3) % 255) as u8
    }).collect();
    IndexedImage::new(palette, ImgVec::new(indices, width, frames * height)).unwrap()
}

#[bench]
fn diffuse(b: &mut Bencher) {
    let img = wide_strip(512, 512);
    b.iter(move || {
        dither::diffuse(img.as_ref()).unwrap();
    });
}

#[bench]
fn sequence_encode(b: &mut Bencher) {
    let strip = indexed_strip(24, 128, 128);
    b.iter(move || {
        sequence::encode(&strip, 24).unwrap();
    });
}

#[bench]
fn stream_encode(b: &mut Bencher) {
    let strip = indexed_strip(24, 128, 128);
    b.iter(move || {
        stream::encode(&strip, 24).unwrap();
    });
}

#[bench]
fn raster_search(b: &mut Bencher) {
    let stream = stream::encode(&indexed_strip(8, 32, 32), 8).unwrap();
    let mut attr = Attributes::new();
    attr.set_max_raster_width(2048).unwrap();
    b.iter(move || {
        optimize::search(&attr, &stream, &PngEncoder).unwrap();
    });
}
