//! Metrics and observability for the frame pipeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use serde::{Deserialize, Serialize};

/// Pipeline counters, shared between the producer, the render consumer and
/// completion watchers
pub struct PipelineMetrics {
    pub frames_ingested: AtomicU64,
    pub frames_overwritten: AtomicU64,
    pub grade_time_us: AtomicU64,

    // Render clock outcomes
    pub ticks: AtomicU64,
    pub ticks_busy: AtomicU64,
    pub ticks_no_frame: AtomicU64,
    pub ticks_surface_unavailable: AtomicU64,
    pub frames_presented: AtomicU64,
    pub completions: AtomicU64,

    pub lut_reloads: AtomicU64,
    pub lut_reload_failures: AtomicU64,
}

/// What happened on one render tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    Busy,
    NoFrame,
    SurfaceUnavailable,
    Presented,
}

impl PipelineMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_ingest(&self, overwrote: bool, grade_us: u64) {
        self.frames_ingested.fetch_add(1, Ordering::Relaxed);
        if overwrote {
            self.frames_overwritten.fetch_add(1, Ordering::Relaxed);
        }
        self.grade_time_us.fetch_add(grade_us, Ordering::Relaxed);
    }

    pub fn record_tick(&self, kind: TickKind) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        match kind {
            TickKind::Busy => self.ticks_busy.fetch_add(1, Ordering::Relaxed),
            TickKind::NoFrame => self.ticks_no_frame.fetch_add(1, Ordering::Relaxed),
            TickKind::SurfaceUnavailable => self.ticks_surface_unavailable.fetch_add(1, Ordering::Relaxed),
            TickKind::Presented => self.frames_presented.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_completion(&self) {
        self.completions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lut_reload(&self, success: bool) {
        if success {
            self.lut_reloads.fetch_add(1, Ordering::Relaxed);
        } else {
            self.lut_reload_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let ingested = self.frames_ingested.load(Ordering::Relaxed);
        let grade_us = self.grade_time_us.load(Ordering::Relaxed);

        MetricsSnapshot {
            frames_ingested: ingested,
            frames_overwritten: self.frames_overwritten.load(Ordering::Relaxed),
            avg_grade_us: if ingested > 0 { grade_us / ingested } else { 0 },
            render: RenderMetrics {
                ticks: self.ticks.load(Ordering::Relaxed),
                busy: self.ticks_busy.load(Ordering::Relaxed),
                no_frame: self.ticks_no_frame.load(Ordering::Relaxed),
                surface_unavailable: self.ticks_surface_unavailable.load(Ordering::Relaxed),
                presented: self.frames_presented.load(Ordering::Relaxed),
                completions: self.completions.load(Ordering::Relaxed),
            },
            lut_reloads: self.lut_reloads.load(Ordering::Relaxed),
            lut_reload_failures: self.lut_reload_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            frames_ingested: AtomicU64::new(0),
            frames_overwritten: AtomicU64::new(0),
            grade_time_us: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            ticks_busy: AtomicU64::new(0),
            ticks_no_frame: AtomicU64::new(0),
            ticks_surface_unavailable: AtomicU64::new(0),
            frames_presented: AtomicU64::new(0),
            completions: AtomicU64::new(0),
            lut_reloads: AtomicU64::new(0),
            lut_reload_failures: AtomicU64::new(0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub frames_ingested: u64,
    pub frames_overwritten: u64,
    pub avg_grade_us: u64,
    pub render: RenderMetrics,
    pub lut_reloads: u64,
    pub lut_reload_failures: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderMetrics {
    pub ticks: u64,
    pub busy: u64,
    pub no_frame: u64,
    pub surface_unavailable: u64,
    pub presented: u64,
    pub completions: u64,
}

/// Timer for tracking operation latency
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_accounting() {
        let m = PipelineMetrics::new();
        m.record_tick(TickKind::Busy);
        m.record_tick(TickKind::Presented);
        m.record_tick(TickKind::NoFrame);
        let snap = m.snapshot();
        assert_eq!(snap.render.ticks, 3);
        assert_eq!(snap.render.busy, 1);
        assert_eq!(snap.render.presented, 1);
        assert_eq!(snap.render.no_frame, 1);
    }

    #[test]
    fn test_avg_grade_time() {
        let m = PipelineMetrics::new();
        m.record_ingest(false, 100);
        m.record_ingest(true, 300);
        let snap = m.snapshot();
        assert_eq!(snap.avg_grade_us, 200);
        assert_eq!(snap.frames_overwritten, 1);
    }
}
