use imgref::{ImgRef, ImgVec};
use pixelsequencer::*;
use std::sync::{Arc, Mutex};

/// Palette entries in order of first appearance, no approximation
struct ExactPalette;

impl Quantizer for ExactPalette {
    fn quantize(&self, pixels: ImgRef<'_, RGBA>, options: &QuantizeOptions) -> Result<IndexedImage, Error> {
        let mut palette = Palette::new();
        let mut indices = Vec::with_capacity(pixels.width() * pixels.height());
        for px in pixels.pixels() {
            let index = match palette.iter().position(|&c| c == px) {
                Some(i) => i as PalIndex,
                None if palette.len() < options.max_colors as usize => palette.push(px)?,
                None => return Err(Error::TooManyColors(palette.len() + 1)),
            };
            indices.push(index);
        }
        IndexedImage::new(palette, ImgVec::new(indices, pixels.width(), pixels.height()))
    }
}

/// 4 frames of 10×8: a striped background with a block moving right
fn animation() -> ImgVec<RGBA> {
    let (frames, width, height) = (4, 10, 8);
    let mut px = Vec::new();
    for f in 0..frames {
        for y in 0..height {
            for x in 0..width {
                let block = (f * 2..f * 2 + 3).contains(&x) && (2..5).contains(&y);
                px.push(if block {
                    RGBA::new(250, 40, 40, 255)
                } else {
                    RGBA::new(20, 20 + (y as u8 % 3) * 60, 90, 255)
                });
            }
        }
    }
    ImgVec::new(px, width, frames * height)
}

fn decode_png(data: &[u8]) -> Decoded {
    png::decode(data).unwrap()
}

fn strip_png() -> Vec<u8> {
    png::encode_rgba(animation().as_ref()).unwrap()
}

#[test]
fn sequence_png_round_trip() {
    let p = Pipeline::with_quantizer(Attributes::new(), ExactPalette);
    let seq = p.encode_sequence(decode_png(&strip_png()), 4).unwrap();
    assert_eq!((40, 8), (seq.width(), seq.height()));

    let seq_png = png::encode_indexed(seq.indices(), seq.palette()).unwrap();
    let decoded = decode_png(&seq_png);
    assert!(matches!(decoded, Decoded::Indexed(_)));
    let strip = p.decode_sequence(&decoded, 4).unwrap();
    assert_eq!((10, 32), (strip.width(), strip.height()));
    assert_eq!(animation().buf(), strip.buf());
}

#[test]
fn sequence_columns() {
    let p = Pipeline::with_quantizer(Attributes::new(), ExactPalette);
    let seq = p.encode_sequence(decode_png(&strip_png()), 4).unwrap();
    let seq = seq.to_rgba().unwrap();
    let anim = animation();
    for f in 0..4usize {
        for y in 0..8usize {
            for x in 0..10usize {
                assert_eq!(anim[(x, y + f * 8)], seq[(f + 4 * x, y)]);
            }
        }
    }
}

#[test]
fn stream_candidates() {
    let p = Pipeline::with_quantizer(Attributes::new(), ExactPalette);
    let candidates = p.encode_stream(decode_png(&strip_png()), 4, &PngEncoder).unwrap();

    assert_eq!(40, candidates[0].width);
    assert_eq!(8, candidates[0].height);
    assert!(candidates.windows(2).all(|w| w[1].len() < w[0].len() && w[1].width > w[0].width));

    for c in &candidates {
        assert_eq!(c.width * c.height - 320, c.wasted);
        let decoded = decode_png(&c.encoded);
        assert_eq!((c.width, c.height), (decoded.width(), decoded.height()));
        let frames = if c.wasted > 0 { Some(4) } else { None };
        let strip = p.decode_stream(&decoded, 10, 8, frames).unwrap();
        assert_eq!(animation().buf(), strip.buf());
    }
}

#[test]
fn stream_layout_and_padding() {
    let p = Pipeline::with_quantizer(Attributes::new(), ExactPalette);
    let strip = p.quantize(decode_png(&strip_png()), Layout::Stream).unwrap();
    let stream = stream::encode(&strip, 4).unwrap();
    assert_eq!(320, stream.indices().len());
    assert_eq!((4, 80), (stream.image().width(), stream.image().height()));
    assert_eq!(FrameGeometry::new(4, 10, 8).unwrap(), *stream.geometry());

    let r = optimize::raster(stream.indices(), 40).unwrap();
    assert_eq!((40, 8), (r.width(), r.height()));

    let r = optimize::raster(stream.indices(), 13).unwrap();
    assert_eq!((13, 25), (r.width(), r.height()));
    assert!(r.buf()[320..].iter().all(|&i| i == 0));

    // 13×25 holds 325 cells, which isn't a whole number of frames
    let padded = Decoded::Indexed(IndexedImage::new(stream.palette().clone(), r).unwrap());
    assert!(matches!(p.decode_stream(&padded, 10, 8, None), Err(Error::PixelCountNotDivisible { pixels: 325, .. })));
    assert_eq!(animation().buf(), p.decode_stream(&padded, 10, 8, Some(4)).unwrap().buf());
}

#[test]
fn zero_waste_and_cap() {
    let mut attr = Attributes::new();
    attr.set_zero_waste_only(true);
    attr.set_max_raster_width(200).unwrap();
    let p = Pipeline::with_quantizer(attr, ExactPalette);
    let candidates = p.encode_stream(decode_png(&strip_png()), 4, &PngEncoder).unwrap();
    assert!(candidates.iter().all(|c| c.wasted == 0 && c.width <= 200 && 320 % c.width == 0));
}

#[test]
fn geometry_errors() {
    let p = Pipeline::with_quantizer(Attributes::new(), ExactPalette);

    let err = p.encode_sequence(decode_png(&strip_png()), 3).unwrap_err();
    assert!(matches!(err, Error::HeightNotDivisible { height: 32, frames: 3 }));
    assert_eq!(ErrorKind::Validation, err.kind());
    assert_eq!(65, err.exit_code());

    let seq = p.encode_sequence(decode_png(&strip_png()), 4).unwrap();
    let seq = Decoded::Indexed(seq);
    assert!(matches!(p.decode_sequence(&seq, 3), Err(Error::WidthNotDivisible { width: 40, frames: 3 })));
    assert!(matches!(p.decode_stream(&seq, 7, 8, None), Err(Error::PixelCountNotDivisible { .. })));
    assert!(matches!(p.decode_stream(&decode_png(&strip_png()), 10, 8, None), Err(Error::NotPaletted)));
    assert!(matches!(p.encode_stream(decode_png(&strip_png()), 0, &PngEncoder), Err(Error::InvalidFrameCount(0))));
}

#[test]
fn not_a_png() {
    let err = png::decode(b"GIF89a").unwrap_err();
    assert!(matches!(err, Error::Png(_)));
    assert_eq!(70, err.exit_code());
}

#[test]
fn wide_png_is_diffused() {
    // 16-bit samples are big-endian in the file
    let bytes: Vec<u8> = (0..64u16)
        .flat_map(|n| [n * 0x0404, 0xF0F0 - n * 0x0101, 0x1234, 0xFFFE])
        .flat_map(u16::to_be_bytes)
        .collect();
    let mut enc = lodepng::Encoder::new();
    enc.set_auto_convert(false);
    enc.info_raw_mut().colortype = lodepng::ColorType::RGBA;
    enc.info_raw_mut().set_bitdepth(16);
    enc.info_png_mut().color.colortype = lodepng::ColorType::RGBA;
    enc.info_png_mut().color.set_bitdepth(16);
    let data = enc.encode(&bytes, 8, 8).unwrap();

    let decoded = decode_png(&data);
    let Decoded::Wide(wide) = &decoded else { panic!("not 16-bit") };
    assert_eq!(RGBA16::new(0x0404, 0xEFEF, 0x1234, 0xFFFE), wide.buf()[1]);

    let p = Pipeline::with_quantizer(Attributes::new(), ExactPalette);
    let narrow = p.diffuse(&decoded).unwrap().unwrap();
    assert_eq!((8, 8), (narrow.width(), narrow.height()));
    assert!(narrow.buf().iter().all(|px| px.a == 0xFF && (px.b == 0x12 || px.b == 0x13)));
    for (px, w) in narrow.buf().iter().zip(wide.buf()) {
        assert!(px.r.abs_diff((w.r >> 8) as u8) <= 1 && px.g.abs_diff((w.g >> 8) as u8) <= 1);
    }

    let png8 = png::encode_rgba(narrow.as_ref()).unwrap();
    assert!(p.diffuse(&decode_png(&png8)).unwrap().is_none());
}

#[test]
fn unquantized_png_is_full_color() {
    let p = Pipeline::with_quantizer(Attributes::new(), ExactPalette);
    let indexed = p.quantize(Decoded::Narrow(animation()), Layout::Sequence).unwrap();
    let indexed_png = png::encode_indexed(indexed.indices(), indexed.palette()).unwrap();

    let rgba = p.unquantize(decode_png(&indexed_png)).unwrap();
    let decoded = decode_png(&png::encode_rgba(rgba.as_ref()).unwrap());
    assert!(matches!(decoded, Decoded::Narrow(_)), "{}", decoded.describe());
    assert_eq!(animation().buf(), decoded.into_narrow().unwrap().buf());

    let seq = p.encode_sequence(Decoded::Narrow(animation()), 4).unwrap();
    let strip = p.decode_sequence(&Decoded::Indexed(seq), 4).unwrap();
    assert!(matches!(decode_png(&png::encode_rgba(strip.as_ref()).unwrap()), Decoded::Narrow(_)));
}

#[test]
fn log_messages() {
    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut attr = Attributes::new();
    let sink = lines.clone();
    attr.set_log_callback(move |_, msg| sink.lock().unwrap().push(msg.to_owned()));
    let p = Pipeline::with_quantizer(attr, ExactPalette);
    p.encode_stream(decode_png(&strip_png()), 4, &PngEncoder).unwrap();

    let lines = lines.lock().unwrap();
    assert!(lines.iter().any(|l| l.contains("4 frames of 10x8")));
    assert!(lines.iter().any(|l| l.contains("raster 40x8")));
    assert!(lines.iter().any(|l| l.contains("best raster width")));
}

#[test]
fn imagequant_sequence() {
    let p = Pipeline::new(Attributes::new());
    let seq = p.encode_sequence(Decoded::Narrow(animation()), 4).unwrap();
    assert_eq!((40, 8), (seq.width(), seq.height()));
    assert!(seq.palette().len() <= 256);

    let strip = p.decode_sequence(&Decoded::Indexed(seq), 4).unwrap();
    for (a, b) in animation().buf().iter().zip(strip.buf()) {
        assert!(a.r.abs_diff(b.r) < 8 && a.g.abs_diff(b.g) < 8 && a.b.abs_diff(b.b) < 8);
    }
}

#[test]
fn imagequant_stream() {
    let mut attr = Attributes::new();
    attr.set_speed(10).unwrap();
    let p = Pipeline::new(attr);
    let candidates = p.encode_stream(Decoded::Narrow(animation()), 4, &PngEncoder).unwrap();
    let best = candidates.last().unwrap();
    let Decoded::Indexed(raster) = decode_png(&best.encoded) else { panic!("not indexed") };
    assert!(raster.palette().len() <= 255);
}

fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("pixelsequencer-cli-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn path_str(path: &std::path::Path) -> &str {
    path.to_str().unwrap()
}

fn cli(args: &[&str]) -> std::process::Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_pixelsequencer"))
        .arg("--quiet")
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn cli_geometry_error_writes_nothing() {
    let dir = scratch_dir("geometry");
    let input = dir.join("strip.png");
    let output = dir.join("out.png");
    std::fs::write(&input, strip_png()).unwrap();

    let run = cli(&["encode", path_str(&input), "3", path_str(&output)]);
    assert_eq!(Some(65), run.status.code());
    assert!(String::from_utf8_lossy(&run.stderr).contains("error"));
    assert!(!output.exists());

    let seq = Pipeline::with_quantizer(Attributes::new(), ExactPalette).encode_sequence(Decoded::Narrow(animation()), 4).unwrap();
    let seq_path = dir.join("seq.png");
    std::fs::write(&seq_path, png::encode_indexed(seq.indices(), seq.palette()).unwrap()).unwrap();
    let run = cli(&["decode", path_str(&seq_path), "3", path_str(&output)]);
    assert_eq!(Some(65), run.status.code());
    assert!(!output.exists());

    let run = cli(&["stream-encode", path_str(&input), "3", path_str(&output)]);
    assert_eq!(Some(65), run.status.code());
    assert_eq!(2, std::fs::read_dir(&dir).unwrap().count());

    let run = cli(&["decode", path_str(&dir.join("missing.png")), "4", path_str(&output)]);
    assert_eq!(Some(74), run.status.code());
    assert!(!output.exists());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn cli_stream_round_trip() {
    let dir = scratch_dir("stream");
    let input = dir.join("strip.png");
    std::fs::write(&input, strip_png()).unwrap();

    let run = cli(&["--speed", "10", "stream-encode", "--best-only", path_str(&input), "4", path_str(&dir.join("s.png"))]);
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));

    let mut names: Vec<String> = std::fs::read_dir(&dir).unwrap().map(|e| e.unwrap().file_name().into_string().unwrap()).collect();
    names.retain(|n| n != "strip.png");
    assert_eq!(1, names.len(), "{names:?}");
    assert!(names[0].ends_with("-s.png"));

    let stream = dir.join(&names[0]);
    let Decoded::Indexed(raster) = decode_png(&std::fs::read(&stream).unwrap()) else { panic!("not indexed") };
    let frames = if raster.width() * raster.height() == 320 { vec![] } else { vec!["--frames", "4"] };
    let output = dir.join("strip-out.png");
    let mut args = vec!["stream-decode"];
    args.extend(frames);
    args.extend([path_str(&stream), "10", "8", path_str(&output)]);
    let run = cli(&args);
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));

    let decoded = decode_png(&std::fs::read(&output).unwrap());
    assert!(matches!(decoded, Decoded::Narrow(_)));
    assert_eq!((10, 32), (decoded.width(), decoded.height()));
    std::fs::remove_dir_all(&dir).unwrap();
}
