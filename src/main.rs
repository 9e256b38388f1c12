use clap::{Parser, Subcommand};
use pixelsequencer::{png, Attributes, Decoded, Error, Layout, Pipeline, PngEncoder, DEFAULT_MAX_RASTER_WIDTH};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser, Debug)]
#[command(name = "pixelsequencer")]
#[command(author, version, about = "Re-lays vertical strips of animation frames for better PNG compression", long_about = None)]
struct Args {
    /// Don't print progress to stderr
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Palette generation speed, 1 (slowest, best) to 10
    #[arg(long, default_value_t = 1, global = true)]
    speed: i32,

    /// Drop the low byte of 16-bit input instead of error diffusion
    #[arg(long, global = true)]
    no_diffuse: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reduce a 16-bit PNG to 8 bits per channel (other PNGs are copied as-is)
    Diffuse { input: PathBuf, output: PathBuf },
    /// Reduce a single image to a palette of at most 256 colors
    Quantize { input: PathBuf, output: PathBuf },
    /// Write any image as 8-bit RGBA
    Unquantize { input: PathBuf, output: PathBuf },
    /// Vertical frame strip to palette pixel sequence
    Encode {
        input: PathBuf,
        frame_count: usize,
        output: PathBuf,
    },
    /// Palette pixel sequence to vertical frame strip
    Decode {
        input: PathBuf,
        frame_count: usize,
        output: PathBuf,
    },
    /// Vertical frame strip to palette pixel stream, written as `<width>-<output name>` for every raster width that was smaller than all before it
    StreamEncode {
        /// Widest raster to try
        #[arg(long, default_value_t = DEFAULT_MAX_RASTER_WIDTH)]
        max_width: usize,
        /// Only try raster widths that need no padding
        #[arg(long)]
        zero_waste_only: bool,
        /// Write only the smallest file
        #[arg(long)]
        best_only: bool,
        input: PathBuf,
        frame_count: usize,
        output: PathBuf,
    },
    /// Palette pixel stream of any raster width to vertical frame strip
    StreamDecode {
        /// Number of frames, required if the stream ends with padding
        #[arg(long)]
        frames: Option<usize>,
        input: PathBuf,
        frame_width: usize,
        frame_height: usize,
        output: PathBuf,
    },
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("error: {err}");
        process::exit(err.exit_code());
    }
}

fn run(args: Args) -> Result<(), Error> {
    let mut attr = Attributes::new();
    attr.set_speed(args.speed)?;
    attr.set_diffuse_wide(!args.no_diffuse);
    if let Command::StreamEncode { max_width, zero_waste_only, .. } = &args.command {
        attr.set_max_raster_width(*max_width)?;
        attr.set_zero_waste_only(*zero_waste_only);
    }
    let verbose = !args.quiet;
    if verbose {
        attr.set_log_callback(|_, msg| eprintln!("{msg}"));
    }
    let pipeline = Pipeline::new(attr);

    match args.command {
        Command::Diffuse { input, output } => {
            let (data, decoded) = load(verbose, &input)?;
            match pipeline.diffuse(&decoded)? {
                Some(img) => save(verbose, &output, &png::encode_rgba(img.as_ref())?),
                None => {
                    log(verbose, "  not a 16-bit image, copying");
                    save(verbose, &output, &data)
                },
            }
        },
        Command::Quantize { input, output } => {
            let (_, decoded) = load(verbose, &input)?;
            let img = pipeline.quantize(decoded, Layout::Sequence)?;
            save(verbose, &output, &png::encode_indexed(img.indices(), img.palette())?)
        },
        Command::Unquantize { input, output } => {
            let (_, decoded) = load(verbose, &input)?;
            let img = pipeline.unquantize(decoded)?;
            save(verbose, &output, &png::encode_rgba(img.as_ref())?)
        },
        Command::Encode { input, frame_count, output } => {
            let (_, decoded) = load(verbose, &input)?;
            let img = pipeline.encode_sequence(decoded, frame_count)?;
            save(verbose, &output, &png::encode_indexed(img.indices(), img.palette())?)
        },
        Command::Decode { input, frame_count, output } => {
            let (_, decoded) = load(verbose, &input)?;
            let img = pipeline.decode_sequence(&decoded, frame_count)?;
            save(verbose, &output, &png::encode_rgba(img.as_ref())?)
        },
        Command::StreamEncode { input, frame_count, output, best_only, .. } => {
            let file_name = output.file_name()
                .ok_or(Error::ValueOutOfRange("output file name"))?
                .to_string_lossy()
                .into_owned();
            let (_, decoded) = load(verbose, &input)?;
            let mut candidates = pipeline.encode_stream(decoded, frame_count, &PngEncoder)?;
            if best_only {
                let worse = candidates.len().saturating_sub(1);
                candidates.drain(..worse);
            }
            let files: Vec<_> = candidates.iter()
                .map(|c| (output.with_file_name(c.tagged_file_name(&file_name)), &c.encoded[..]))
                .collect();
            save_all(verbose, &files)
        },
        Command::StreamDecode { frames, input, frame_width, frame_height, output } => {
            let (_, decoded) = load(verbose, &input)?;
            let img = pipeline.decode_stream(&decoded, frame_width, frame_height, frames)?;
            save(verbose, &output, &png::encode_rgba(img.as_ref())?)
        },
    }
}

fn log(verbose: bool, msg: &str) {
    if verbose {
        eprintln!("{msg}");
    }
}

fn load(verbose: bool, path: &Path) -> Result<(Vec<u8>, Decoded), Error> {
    let data = fs::read(path)?;
    let decoded = png::decode(&data)?;
    log(verbose, &format!("Input image {}: {}", path.display(), decoded.describe()));
    Ok((data, decoded))
}

fn save(verbose: bool, path: &Path, data: &[u8]) -> Result<(), Error> {
    save_all(verbose, &[(path.to_path_buf(), data)])
}

/// Either every file is written, or none of them
fn save_all(verbose: bool, files: &[(PathBuf, &[u8])]) -> Result<(), Error> {
    let mut parts = Vec::with_capacity(files.len());
    for (path, data) in files {
        let part = part_path(path);
        if let Err(err) = fs::write(&part, data) {
            parts.into_iter().for_each(remove);
            return Err(err.into());
        }
        parts.push(part);
    }

    for (n, (part, (path, _))) in parts.iter().zip(files).enumerate() {
        if let Err(err) = fs::rename(part, path) {
            files[..n].iter().map(|(path, _)| path).for_each(remove);
            parts[n..].iter().for_each(remove);
            return Err(err.into());
        }
    }
    for (path, data) in files {
        log(verbose, &format!("Wrote {} ({} bytes)", path.display(), data.len()));
    }
    Ok(())
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".part");
    path.with_file_name(name)
}

fn remove(path: impl AsRef<Path>) {
    let _ = fs::remove_file(path);
}

#[cfg(test)]
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pixelsequencer-{}-{name}", process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn all_files_or_none() {
    let dir = scratch_dir("save");
    let files = [
        (dir.join("40-a.png"), &b"first"[..]),
        (dir.join("80-a.png"), &b"second"[..]),
    ];
    save_all(false, &files).unwrap();
    assert_eq!(b"second", &fs::read(dir.join("80-a.png")).unwrap()[..]);

    let files = [
        (dir.join("b.png"), &b"first"[..]),
        (dir.join("missing").join("b.png"), &b"second"[..]),
    ];
    let err = save_all(false, &files).unwrap_err();
    assert_eq!(74, err.exit_code());
    assert!(!dir.join("b.png").exists());
    assert!(!part_path(&dir.join("b.png")).exists());

    let mut left: Vec<_> = fs::read_dir(&dir).unwrap().map(|e| e.unwrap().file_name().into_string().unwrap()).collect();
    left.sort();
    assert_eq!(vec!["40-a.png", "80-a.png"], left);
    fs::remove_dir_all(&dir).unwrap();
}
