//! Presentation surfaces
//!
//! A [`Surface`] accepts one composite per render tick and reports completion
//! asynchronously through a oneshot channel. [`MemorySurface`] is a CPU
//! implementation that renders on the rayon pool, so its completion signal
//! arrives on neither the producer thread nor the render clock.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::SurfaceUnavailable;
use crate::frame::{Extent, Frame, PixelFormat};

/// Completion signal for one submitted composite. Resolves when the surface has
/// finished with the frame; an error means the surface dropped the work.
pub type Completion = oneshot::Receiver<()>;

/// Downstream presentation target
pub trait Surface: Send + Sync + 'static {
    /// Current drawable size
    fn extent(&self) -> Extent;

    /// Hand a composite to the surface.
    ///
    /// Failing to obtain a drawable is reported as [`SurfaceUnavailable`]; the
    /// caller skips the tick.
    fn submit(&self, composite: Composite) -> Result<Completion, SurfaceUnavailable>;
}

// ============================================================================
// Aspect-fill transform
// ============================================================================

/// Visible region of the source frame, in source pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Center-crop scale mapping a source extent onto a destination extent while
/// preserving aspect ratio (the destination is fully covered).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectFill {
    pub scale: f32,
    /// Destination-space offset of the scaled source origin (zero or negative)
    pub offset_x: f32,
    pub offset_y: f32,
    pub crop: CropRect,
}

impl AspectFill {
    /// An empty destination yields a unit scale with an empty crop at the
    /// source center.
    pub fn compute(src: Extent, dst: Extent) -> Self {
        let (sw, sh) = (src.width.max(1) as f32, src.height.max(1) as f32);
        if dst.is_empty() {
            return Self {
                scale: 1.0,
                offset_x: 0.0,
                offset_y: 0.0,
                crop: CropRect {
                    x: sw / 2.0,
                    y: sh / 2.0,
                    width: 0.0,
                    height: 0.0,
                },
            };
        }
        let (dw, dh) = (dst.width as f32, dst.height as f32);

        let scale = (dw / sw).max(dh / sh);
        let offset_x = (dw - sw * scale) / 2.0;
        let offset_y = (dh - sh * scale) / 2.0;

        let crop_w = dw / scale;
        let crop_h = dh / scale;

        Self {
            scale,
            offset_x,
            offset_y,
            crop: CropRect {
                x: (sw - crop_w) / 2.0,
                y: (sh - crop_h) / 2.0,
                width: crop_w,
                height: crop_h,
            },
        }
    }

    /// Source pixel sampled for destination pixel center (x, y)
    #[inline]
    pub fn source_point(&self, x: u32, y: u32) -> (f32, f32) {
        (
            (x as f32 + 0.5 - self.offset_x) / self.scale,
            (y as f32 + 0.5 - self.offset_y) / self.scale,
        )
    }
}

/// One frame placed on a destination surface
#[derive(Debug, Clone)]
pub struct Composite {
    pub frame: Arc<Frame>,
    pub transform: AspectFill,
    pub destination: Extent,
}

impl Composite {
    pub fn new(frame: Arc<Frame>, destination: Extent) -> Self {
        let transform = AspectFill::compute(frame.extent(), destination);
        Self {
            frame,
            transform,
            destination,
        }
    }

    /// Rasterize into a tightly packed RGBA8 buffer (nearest neighbour).
    pub fn render_rgba(&self) -> Vec<u8> {
        let dst_w = self.destination.width as usize;
        let dst_h = self.destination.height as usize;
        let mut out = vec![0u8; dst_w * dst_h * 4];
        if dst_w == 0 || dst_h == 0 {
            return out;
        }

        let frame = &self.frame;
        let src = frame.data();
        let bpp = frame.format().bytes_per_pixel();
        let [ro, go, bo] = frame.format().rgb_offsets();
        let has_alpha = frame.format() != PixelFormat::Rgb8;
        let max_x = frame.width() as usize - 1;
        let max_y = frame.height() as usize - 1;
        let row_bytes = frame.row_bytes();

        out.par_chunks_mut(dst_w * 4).enumerate().for_each(|(y, row)| {
            for x in 0..dst_w {
                let (sx, sy) = self.transform.source_point(x as u32, y as u32);
                let sx = (sx.max(0.0) as usize).min(max_x);
                let sy = (sy.max(0.0) as usize).min(max_y);
                let idx = sy * row_bytes + sx * bpp;
                let px = &mut row[x * 4..x * 4 + 4];
                px[0] = src[idx + ro];
                px[1] = src[idx + go];
                px[2] = src[idx + bo];
                px[3] = if has_alpha { src[idx + 3] } else { 255 };
            }
        });

        out
    }
}

// ============================================================================
// Memory surface
// ============================================================================

/// Last image a [`MemorySurface`] rendered
#[derive(Debug, Clone)]
pub struct PresentedImage {
    pub sequence: u64,
    pub extent: Extent,
    pub rgba: Vec<u8>,
}

struct Inner {
    extent: Extent,
    refuse_next: AtomicUsize,
    hold_completions: AtomicBool,
    held: Mutex<Vec<oneshot::Sender<()>>>,
    last: Mutex<Option<PresentedImage>>,
    rendered: AtomicU64,
}

/// CPU-backed surface rendering composites on the rayon pool
#[derive(Clone)]
pub struct MemorySurface {
    inner: Arc<Inner>,
}

impl MemorySurface {
    pub fn new(extent: Extent) -> Self {
        Self {
            inner: Arc::new(Inner {
                extent,
                refuse_next: AtomicUsize::new(0),
                hold_completions: AtomicBool::new(false),
                held: Mutex::new(Vec::new()),
                last: Mutex::new(None),
                rendered: AtomicU64::new(0),
            }),
        }
    }

    /// Report the next `count` submits as unavailable.
    pub fn refuse_next(&self, count: usize) {
        self.inner.refuse_next.store(count, Ordering::SeqCst);
    }

    /// Keep completion signals parked until [`complete_held`](Self::complete_held).
    pub fn hold_completions(&self, hold: bool) {
        self.inner.hold_completions.store(hold, Ordering::SeqCst);
    }

    /// Fire every parked completion. Returns how many were released.
    pub fn complete_held(&self) -> usize {
        let senders: Vec<_> = std::mem::take(
            &mut *self.inner.held.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let count = senders.len();
        for tx in senders {
            let _ = tx.send(());
        }
        count
    }

    /// Composites fully rendered so far
    pub fn rendered(&self) -> u64 {
        self.inner.rendered.load(Ordering::SeqCst)
    }

    pub fn last_presented(&self) -> Option<PresentedImage> {
        self.inner
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Surface for MemorySurface {
    fn extent(&self) -> Extent {
        self.inner.extent
    }

    fn submit(&self, composite: Composite) -> Result<Completion, SurfaceUnavailable> {
        let refused = self
            .inner
            .refuse_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(SurfaceUnavailable("no drawable available".to_string()));
        }

        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        rayon::spawn(move || {
            let rgba = composite.render_rgba();
            let sequence = composite.frame.sequence();
            *inner.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(PresentedImage {
                sequence,
                extent: composite.destination,
                rgba,
            });
            debug!("MemorySurface rendered frame #{}", sequence);

            if inner.hold_completions.load(Ordering::SeqCst) {
                inner.held.lock().unwrap_or_else(PoisonError::into_inner).push(tx);
            } else {
                let _ = tx.send(());
            }
            // Counted after the completion is parked or fired
            inner.rendered.fetch_add(1, Ordering::SeqCst);
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_aspect_fill_wider_source() {
        // 16:9 source onto a square: height matches, sides cropped
        let fill = AspectFill::compute(Extent::new(1920, 1080), Extent::new(540, 540));
        assert!((fill.scale - 0.5).abs() < 1e-6);
        assert!((fill.crop.height - 1080.0).abs() < 1e-3);
        assert!((fill.crop.width - 1080.0).abs() < 1e-3);
        assert!((fill.crop.x - 420.0).abs() < 1e-3);
        assert!(fill.crop.y.abs() < 1e-3);
        assert!((fill.offset_x + 210.0).abs() < 1e-3);
    }

    #[test]
    fn test_aspect_fill_taller_source() {
        let fill = AspectFill::compute(Extent::new(100, 400), Extent::new(200, 200));
        assert!((fill.scale - 2.0).abs() < 1e-6);
        assert!((fill.crop.width - 100.0).abs() < 1e-3);
        assert!((fill.crop.height - 100.0).abs() < 1e-3);
        assert!((fill.crop.y - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_aspect_fill_identity() {
        let fill = AspectFill::compute(Extent::new(64, 48), Extent::new(64, 48));
        assert_eq!(fill.scale, 1.0);
        assert_eq!(fill.source_point(3, 4), (3.5, 4.5));
    }

    #[test]
    fn test_aspect_fill_empty_destination() {
        for dst in [Extent::new(0, 0), Extent::new(0, 10), Extent::new(10, 0)] {
            let fill = AspectFill::compute(Extent::new(64, 48), dst);
            assert_eq!(fill.scale, 1.0);
            assert_eq!(fill.crop, CropRect { x: 32.0, y: 24.0, width: 0.0, height: 0.0 });
        }

        let frame = Arc::new(Frame::new(vec![1u8; 4], 1, 1, PixelFormat::Rgba8, Duration::ZERO, 0).unwrap());
        assert!(Composite::new(frame, Extent::new(0, 0)).render_rgba().is_empty());
    }

    #[test]
    fn test_render_center_crop() {
        // 4x1 BGRA strip with distinct blue values, shown on a 2x1 target
        let data = vec![
            10, 0, 0, 255, 20, 0, 0, 255, 30, 0, 0, 255, 40, 0, 0, 255,
        ];
        let frame = Arc::new(Frame::new(data, 4, 1, PixelFormat::Bgra8, Duration::ZERO, 0).unwrap());
        let rgba = Composite::new(frame, Extent::new(2, 1)).render_rgba();
        // Center two pixels survive, converted to RGBA order
        assert_eq!(rgba, vec![0, 0, 20, 255, 0, 0, 30, 255]);
    }

    #[tokio::test]
    async fn test_memory_surface_completes() {
        let surface = MemorySurface::new(Extent::new(8, 8));
        let frame = Arc::new(Frame::new(vec![7u8; 4 * 4 * 3], 4, 4, PixelFormat::Rgb8, Duration::ZERO, 9).unwrap());
        let done = surface.submit(Composite::new(frame, surface.extent())).unwrap();
        done.await.unwrap();
        let last = surface.last_presented().unwrap();
        assert_eq!(last.sequence, 9);
        assert_eq!(last.rgba.len(), 8 * 8 * 4);
        assert_eq!(&last.rgba[..4], &[7, 7, 7, 255]);
    }

    #[test]
    fn test_memory_surface_refuses() {
        let surface = MemorySurface::new(Extent::new(2, 2));
        surface.refuse_next(1);
        let frame = Arc::new(Frame::new(vec![0u8; 4], 1, 1, PixelFormat::Rgba8, Duration::ZERO, 0).unwrap());
        assert!(surface.submit(Composite::new(Arc::clone(&frame), surface.extent())).is_err());
        assert!(surface.submit(Composite::new(frame, surface.extent())).is_ok());
    }
}
