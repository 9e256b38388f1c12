use crate::error::Error;
use crate::pal::MAX_COLORS;
use std::fmt;
use std::sync::Arc;

/// Widest raster the width search will try.
///
/// Very wide, very short rasters defeat the 2-D prediction filters of the PNG compressor.
pub const DEFAULT_MAX_RASTER_WIDTH: usize = 300_000;

/// How the frames are interleaved
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Layout {
    /// One scanline of every frame side by side, `frame_height` rows tall
    Sequence,
    /// Every pixel position sampled across all frames, one after another
    Stream,
}

impl Layout {
    /// Stream layout keeps one palette slot free for frame differencing
    #[inline]
    #[must_use]
    pub fn max_colors(self) -> u32 {
        match self {
            Self::Sequence => MAX_COLORS as u32,
            Self::Stream => MAX_COLORS as u32 - 1,
        }
    }
}

/// What the palette remapper is asked to do
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct QuantizeOptions {
    /// 255 or 256
    pub max_colors: u32,
    /// 1-10, 1 is the slowest and best
    pub speed: u8,
}

/// Settings for a run of the pipeline. Start here.
#[derive(Clone)]
pub struct Attributes {
    speed: u8,
    max_raster_width: usize,
    diffuse_wide: bool,
    zero_waste_only: bool,
    log_callback: Option<Arc<dyn Fn(&Attributes, &str) + Send + Sync>>,
}

impl Attributes {
    /// Maximum quality, diffusion of 16-bit input, every raster width considered
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            speed: 1,
            max_raster_width: DEFAULT_MAX_RASTER_WIDTH,
            diffuse_wide: true,
            zero_waste_only: false,
            log_callback: None,
        }
    }

    /// 1-10.
    ///
    /// Passed to the palette remapper. Faster speeds generate worse palettes.
    ///
    /// The default is 1.
    #[inline]
    pub fn set_speed(&mut self, value: i32) -> Result<(), Error> {
        if !(1..=10).contains(&value) {
            return Err(Error::ValueOutOfRange("speed"));
        }
        self.speed = value as u8;
        Ok(())
    }

    #[inline(always)]
    #[must_use]
    pub fn speed(&self) -> u32 {
        self.speed.into()
    }

    /// Upper bound for raster widths tried by the width search. The default is 300000.
    #[inline]
    pub fn set_max_raster_width(&mut self, width: usize) -> Result<(), Error> {
        if width == 0 {
            return Err(Error::ValueOutOfRange("max raster width"));
        }
        self.max_raster_width = width;
        Ok(())
    }

    #[inline(always)]
    #[must_use]
    pub fn max_raster_width(&self) -> usize {
        self.max_raster_width
    }

    /// If false, 16-bit input is narrowed by dropping the low byte instead of error diffusion
    #[inline(always)]
    pub fn set_diffuse_wide(&mut self, diffuse: bool) {
        self.diffuse_wide = diffuse;
    }

    #[inline(always)]
    #[must_use]
    pub fn diffuse_wide(&self) -> bool {
        self.diffuse_wide
    }

    /// Only try raster widths that need no padding
    #[inline(always)]
    pub fn set_zero_waste_only(&mut self, only: bool) {
        self.zero_waste_only = only;
    }

    #[inline(always)]
    #[must_use]
    pub fn zero_waste_only(&self) -> bool {
        self.zero_waste_only
    }

    /// Set callback function to be called every time the pipeline wants to print a message.
    ///
    /// To share data with the callback, use `Arc` or `Atomic*` types and `move ||` closures.
    #[inline]
    pub fn set_log_callback<F: Fn(&Attributes, &str) + Send + Sync + 'static>(&mut self, callback: F) {
        self.log_callback = Some(Arc::new(callback));
    }

    #[must_use]
    pub fn quantize_options(&self, layout: Layout) -> QuantizeOptions {
        QuantizeOptions {
            max_colors: layout.max_colors(),
            speed: self.speed,
        }
    }

    #[inline(always)]
    pub(crate) fn verbose_print(&self, msg: impl AsRef<str>) {
        fn _print(a: &Attributes, msg: &str) {
            if let Some(f) = &a.log_callback {
                f(a, msg);
            }
        }
        _print(self, msg.as_ref());
    }
}

impl Default for Attributes {
    #[inline(always)]
    fn default() -> Attributes {
        Attributes::new()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributes")
            .field("speed", &self.speed)
            .field("max_raster_width", &self.max_raster_width)
            .field("diffuse_wide", &self.diffuse_wide)
            .field("zero_waste_only", &self.zero_waste_only)
            .finish_non_exhaustive()
    }
}

#[test]
fn getset() {
    let mut a = Attributes::new();
    assert_eq!(1, a.speed());
    assert_eq!(DEFAULT_MAX_RASTER_WIDTH, a.max_raster_width());
    assert!(a.diffuse_wide());
    assert!(!a.zero_waste_only());

    a.set_speed(5).unwrap();
    assert_eq!(5, a.speed());
    assert!(a.set_speed(0).is_err());
    assert!(a.set_speed(11).is_err());
    assert_eq!(5, a.speed());

    assert!(a.set_max_raster_width(0).is_err());
    a.set_max_raster_width(1000).unwrap();
    assert_eq!(1000, a.max_raster_width());
}

#[test]
fn palette_slots() {
    let a = Attributes::new();
    assert_eq!(QuantizeOptions { max_colors: 256, speed: 1 }, a.quantize_options(Layout::Sequence));
    assert_eq!(255, a.quantize_options(Layout::Stream).max_colors);
}

#[test]
fn log_callback() {
    use std::sync::Mutex;

    let lines = Arc::new(Mutex::new(Vec::new()));
    let mut a = Attributes::new();
    a.verbose_print("dropped");
    let sink = lines.clone();
    a.set_log_callback(move |_, msg| sink.lock().unwrap().push(msg.to_owned()));
    a.verbose_print(format!("  {} frames", 4));
    assert_eq!(vec!["  4 frames".to_string()], *lines.lock().unwrap());
}
