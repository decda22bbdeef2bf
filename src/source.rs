//! Frame sources and the producer thread
//!
//! The producer runs on its own OS thread, standing in for a camera delivery
//! callback: it pulls frames from a [`FrameSource`], grades them and publishes
//! them into the pipeline at the source's rate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::frame::{Frame, PixelFormat};
use crate::pipeline::FramePipeline;

/// Anything that hands out decoded frames one at a time
pub trait FrameSource: Send + 'static {
    /// Next frame, or `None` when the source is exhausted.
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Moving diagonal gradient in BGRA, useful without a camera
pub struct SyntheticSource {
    width: u32,
    height: u32,
    fps: u32,
    sequence: u64,
    limit: Option<u64>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            sequence: 0,
            limit: None,
        }
    }

    /// Stop after `frames` frames.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    fn render(&self) -> Vec<u8> {
        let w = self.width as usize;
        let h = self.height as usize;
        let shift = (self.sequence * 4) as usize;
        let mut data = vec![0u8; w * h * 4];
        for (y, row) in data.chunks_exact_mut(w * 4).enumerate() {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                px[0] = ((y * 255) / h.max(1)) as u8;
                px[1] = (((x + y + shift) * 255) / (w + h).max(1)) as u8;
                px[2] = (((x + shift) % w.max(1)) * 255 / w.max(1)) as u8;
                px[3] = 255;
            }
        }
        data
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Option<Frame> {
        if let Some(limit) = self.limit {
            if self.sequence >= limit {
                return None;
            }
        }
        if self.width == 0 || self.height == 0 {
            warn!("Synthetic source has empty extent {}x{}", self.width, self.height);
            return None;
        }

        let timestamp = if self.fps > 0 {
            Duration::from_nanos(self.sequence * 1_000_000_000 / self.fps as u64)
        } else {
            Duration::ZERO
        };

        let frame = Frame::new(
            self.render(),
            self.width,
            self.height,
            PixelFormat::Bgra8,
            timestamp,
            self.sequence,
        );
        self.sequence += 1;

        match frame {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("Synthetic source produced an invalid frame: {}", e);
                None
            }
        }
    }
}

/// Running producer thread
pub struct ProducerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<u64>>,
}

impl ProducerHandle {
    /// Ask the producer to stop and wait for it. Returns frames produced.
    pub fn stop(mut self) -> u64 {
        self.stop.store(true, Ordering::SeqCst);
        self.join_inner()
    }

    /// Wait for the source to run dry. Returns frames produced.
    pub fn join(mut self) -> u64 {
        self.join_inner()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }

    fn join_inner(&mut self) -> u64 {
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or_else(|_| {
                warn!("Producer thread panicked");
                0
            }),
            None => 0,
        }
    }
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.join_inner();
    }
}

pub struct Producer;

impl Producer {
    /// Spawn a thread feeding `source` into `pipeline` at `fps` (0 = as fast as possible).
    pub fn spawn<S: FrameSource>(
        mut source: S,
        pipeline: Arc<FramePipeline>,
        fps: u32,
    ) -> std::io::Result<ProducerHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let period = (fps > 0).then(|| Duration::from_nanos(1_000_000_000 / fps as u64));

        let thread = std::thread::Builder::new()
            .name("framegrade-producer".to_string())
            .spawn(move || {
                info!("📷 Producer started ({} fps)", fps);
                let start = Instant::now();
                let mut produced = 0u64;

                while !stop_flag.load(Ordering::SeqCst) {
                    let Some(frame) = source.next_frame() else {
                        debug!("Frame source exhausted");
                        break;
                    };
                    pipeline.ingest(frame);
                    produced += 1;

                    if let Some(period) = period {
                        let due = start + period * produced as u32;
                        let now = Instant::now();
                        if due > now {
                            std::thread::sleep(due - now);
                        }
                    }
                }

                info!("Producer stopped after {} frames", produced);
                produced
            })?;

        Ok(ProducerHandle {
            stop,
            thread: Some(thread),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    #[test]
    fn test_synthetic_source_sequence_and_timestamps() {
        let mut source = SyntheticSource::new(16, 8, 25).with_limit(3);
        let a = source.next_frame().unwrap();
        let b = source.next_frame().unwrap();
        let _c = source.next_frame().unwrap();
        assert!(source.next_frame().is_none());

        assert_eq!(a.sequence(), 0);
        assert_eq!(b.sequence(), 1);
        assert_eq!(b.timestamp(), Duration::from_millis(40));
        assert_eq!(a.format(), PixelFormat::Bgra8);
        assert_ne!(a.data(), b.data());
    }

    #[test]
    fn test_synthetic_source_empty_extent() {
        assert!(SyntheticSource::new(0, 8, 30).next_frame().is_none());
        assert!(SyntheticSource::new(8, 0, 30).next_frame().is_none());
    }

    #[test]
    fn test_producer_stops_on_empty_source() {
        let pipeline = FramePipeline::new(PipelineConfig::default(), None).unwrap();
        let handle = Producer::spawn(SyntheticSource::new(0, 8, 0), Arc::clone(&pipeline), 0).unwrap();
        assert_eq!(handle.join(), 0);
        assert_eq!(pipeline.metrics().snapshot().frames_ingested, 0);
    }

    #[test]
    fn test_producer_drains_limited_source() {
        let pipeline = FramePipeline::new(PipelineConfig::default(), None).unwrap();
        let handle = Producer::spawn(
            SyntheticSource::new(8, 8, 0).with_limit(50),
            Arc::clone(&pipeline),
            0,
        )
        .unwrap();

        assert_eq!(handle.join(), 50);
        let snap = pipeline.metrics().snapshot();
        assert_eq!(snap.frames_ingested, 50);
        // Nobody consumed: every frame but the last was overwritten
        assert_eq!(snap.frames_overwritten, 49);
        assert_eq!(pipeline.relay().peek().map(|f| f.sequence()), Some(49));
    }
}
