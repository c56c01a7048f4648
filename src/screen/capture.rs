//! Display enumeration and raw frame capture.
//!
//! Capture handles are tied to the thread that opened them (scrap's
//! `Capturer` is `!Send` on X11), so the source only hands out fresh handles
//! and every thread that captures opens its own.

use scrap::{Capturer, Display};
use std::io::ErrorKind;
use std::time::{Duration, Instant};

use super::{Raster, BYTES_PER_PIXEL};
use crate::error::{Result, StreamError};

/// How long a grab keeps waiting for the compositor to hand over a frame.
pub const GRAB_DEADLINE: Duration = Duration::from_secs(2);

/// Pause between polls while the backend reports "no new frame yet".
const GRAB_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    /// 1-based, matches what users type on the command line
    pub index: usize,
    pub width: u32,
    pub height: u32,
}

/// A single open capture handle.
pub trait DisplayCapture {
    /// Snapshot of the display's current contents in RGBA order.
    fn grab(&mut self) -> Result<Raster>;
}

/// Something that can enumerate displays and open capture handles on them.
pub trait CaptureSource: Send + Sync + 'static {
    fn list_displays(&self) -> Result<Vec<DisplayInfo>>;

    /// Open a handle on display `index` (1-based).
    fn open(&self, index: usize) -> Result<Box<dyn DisplayCapture>>;

    /// One-shot capture: open, grab once, drop the handle.
    fn capture(&self, index: usize) -> Result<Raster> {
        self.open(index)?.grab()
    }
}

/// Checks a 1-based display index against the number of displays.
pub fn check_index(index: usize, available: usize) -> Result<()> {
    if index == 0 || index > available {
        return Err(StreamError::InvalidDisplayIndex { index, available });
    }
    Ok(())
}

// ── scrap backend ────────────────────────────────────────────────

/// Cross-platform capture backed by the `scrap` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScrapSource;

impl ScrapSource {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureSource for ScrapSource {
    fn list_displays(&self) -> Result<Vec<DisplayInfo>> {
        let displays = Display::all().map_err(|e| StreamError::capture(format!("no display found: {e}")))?;

        Ok(displays
            .iter()
            .enumerate()
            .map(|(i, d)| DisplayInfo {
                index: i + 1,
                width: d.width() as u32,
                height: d.height() as u32,
            })
            .collect())
    }

    fn open(&self, index: usize) -> Result<Box<dyn DisplayCapture>> {
        let mut displays = Display::all().map_err(|e| StreamError::capture(format!("no display found: {e}")))?;
        check_index(index, displays.len())?;

        let display = displays.swap_remove(index - 1);
        let width = display.width();
        let height = display.height();
        let capturer = Capturer::new(display)
            .map_err(|e| StreamError::capture(format!("failed to start capture on display {index}: {e}")))?;

        Ok(Box::new(ScrapCapture {
            capturer,
            width,
            height,
        }))
    }
}

struct ScrapCapture {
    capturer: Capturer,
    width: usize,
    height: usize,
}

impl DisplayCapture for ScrapCapture {
    fn grab(&mut self) -> Result<Raster> {
        let started = Instant::now();
        loop {
            match self.capturer.frame() {
                Ok(frame) => {
                    // scrap gives us BGRA pixels (stride may include padding)
                    let stride = frame.len() / self.height.max(1);
                    let rgba = bgra_to_rgba(&frame, self.width, self.height, stride)?;
                    return Raster::new(self.width as u32, self.height as u32, rgba);
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    if started.elapsed() >= GRAB_DEADLINE {
                        return Err(StreamError::capture(format!(
                            "no frame from compositor within {GRAB_DEADLINE:?}"
                        )));
                    }
                    std::thread::sleep(GRAB_POLL);
                }
                Err(e) => return Err(StreamError::capture(e.to_string())),
            }
        }
    }
}

/// Repack a strided BGRA/BGRX buffer into tight RGBA.
///
/// Alpha is forced to 255: some backends report the fourth byte as padding,
/// and a desktop surface is always opaque.
pub fn bgra_to_rgba(bgra: &[u8], width: usize, height: usize, stride: usize) -> Result<Vec<u8>> {
    let row_bytes = width * BYTES_PER_PIXEL;
    if width == 0 || height == 0 {
        return Err(StreamError::capture("display reports zero size"));
    }
    if stride < row_bytes || bgra.len() < stride * (height - 1) + row_bytes {
        return Err(StreamError::capture(format!(
            "short frame: {} bytes for {width}x{height} with stride {stride}",
            bgra.len()
        )));
    }

    let mut rgba = Vec::with_capacity(row_bytes * height);
    for row in bgra.chunks(stride).take(height) {
        for px in row[..row_bytes].chunks_exact(4) {
            rgba.extend_from_slice(&[px[2], px[1], px[0], 255]);
        }
    }
    Ok(rgba)
}
