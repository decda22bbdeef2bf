//! Render consumer
//!
//! Driven by a fixed-rate clock. Each tick walks
//! `Idle → Acquiring → Rendering → Presenting → Idle`:
//!
//! 1. take an admission token (busy: skip the tick)
//! 2. take the latest frame from the relay (none: release and skip)
//! 3. aspect-fill it onto the surface and submit
//! 4. hand the token to a completion watcher that drops it when the surface
//!    confirms the work, not when it was submitted
//!
//! None of the skip paths are errors.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::admission::AdmissionLimiter;
use crate::metrics::{PipelineMetrics, TickKind};
use crate::relay::FrameRelay;
use crate::surface::{Composite, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    Acquiring,
    Rendering,
    Presenting,
}

/// Result of a single render tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Admission limiter at capacity
    Busy,
    /// Relay had nothing new
    NoFrame,
    /// Surface refused the composite; token already released
    SurfaceUnavailable,
    /// Composite submitted; token held until completion
    Presented { sequence: u64 },
}

impl TickOutcome {
    fn kind(&self) -> TickKind {
        match self {
            TickOutcome::Busy => TickKind::Busy,
            TickOutcome::NoFrame => TickKind::NoFrame,
            TickOutcome::SurfaceUnavailable => TickKind::SurfaceUnavailable,
            TickOutcome::Presented { .. } => TickKind::Presented,
        }
    }
}

pub struct RenderConsumer<S: Surface> {
    relay: Arc<FrameRelay>,
    limiter: AdmissionLimiter,
    surface: Arc<S>,
    metrics: Arc<PipelineMetrics>,
    state: RenderState,
    reached: RenderState,
}

impl<S: Surface> RenderConsumer<S> {
    pub fn new(
        relay: Arc<FrameRelay>,
        limiter: AdmissionLimiter,
        surface: Arc<S>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            relay,
            limiter,
            surface,
            metrics,
            state: RenderState::Idle,
            reached: RenderState::Idle,
        }
    }

    /// Always `Idle` between ticks.
    pub fn state(&self) -> RenderState {
        self.state
    }

    /// Furthest state the previous tick got to before returning to `Idle`.
    pub fn reached(&self) -> RenderState {
        self.reached
    }

    fn enter(&mut self, next: RenderState) {
        debug!("Render state {:?} → {:?}", self.state, next);
        self.state = next;
        if next != RenderState::Idle {
            self.reached = next;
        }
    }

    pub fn surface(&self) -> &Arc<S> {
        &self.surface
    }

    /// Run one render tick.
    ///
    /// Must be called inside a tokio runtime: a presented frame spawns its
    /// completion watcher.
    pub fn tick(&mut self) -> TickOutcome {
        self.reached = RenderState::Idle;
        let outcome = self.step();
        self.enter(RenderState::Idle);
        self.metrics.record_tick(outcome.kind());
        outcome
    }

    fn step(&mut self) -> TickOutcome {
        self.enter(RenderState::Acquiring);
        let token = match self.limiter.try_acquire() {
            Ok(token) => token,
            Err(busy) => {
                debug!("Render tick skipped: {}", busy);
                return TickOutcome::Busy;
            }
        };

        self.enter(RenderState::Rendering);
        let Some(frame) = self.relay.take() else {
            token.release();
            return TickOutcome::NoFrame;
        };

        let destination = self.surface.extent();
        if destination.is_empty() {
            token.release();
            warn!("Surface has zero extent, skipping frame #{}", frame.sequence());
            return TickOutcome::SurfaceUnavailable;
        }

        let sequence = frame.sequence();
        let composite = Composite::new(frame, destination);

        self.enter(RenderState::Presenting);
        let completion = match self.surface.submit(composite) {
            Ok(completion) => completion,
            Err(e) => {
                token.release();
                warn!("Frame #{} not presented: {}", sequence, e);
                return TickOutcome::SurfaceUnavailable;
            }
        };

        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            match completion.await {
                Ok(()) => {
                    metrics.record_completion();
                    debug!("Frame #{} completed", sequence);
                }
                Err(_) => warn!("Surface dropped completion for frame #{}", sequence),
            }
            token.release();
        });

        TickOutcome::Presented { sequence }
    }

    /// Tick every `period` until `shutdown` turns true (or its sender is dropped).
    pub async fn run(mut self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut clock = tokio::time::interval(period);
        clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("🖼️  Render consumer started ({:?} period)", period);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = clock.tick() => {
                    self.tick();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Render consumer stopped");
    }
}
