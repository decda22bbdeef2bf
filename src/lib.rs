//! framegrade - color-graded camera frame pipeline
//!
//! Moves decoded frames from a producer thread to a fixed-rate render consumer,
//! grading them with a 3-D `.cube` lookup table on the way. Only the latest
//! frame is kept between the two sides, and a counting admission limiter caps
//! how much render work can be in flight.

pub mod admission;
pub mod capability;
pub mod config;
pub mod error;
pub mod frame;
pub mod grade;
pub mod lut;
pub mod metrics;
pub mod pipeline;
pub mod relay;
pub mod render;
pub mod source;
pub mod still;
pub mod surface;

pub use admission::{AdmissionLimiter, AdmissionToken};
pub use capability::{ColorSpace, FormatDescriptor, FormatFeature, VideoCodec};
pub use config::PipelineConfig;
pub use error::{CapacityExceeded, GradeError, Result, SurfaceUnavailable};
pub use frame::{Extent, Frame, PixelFormat};
pub use lut::{LookupTable, LutStore};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use pipeline::FramePipeline;
pub use relay::FrameRelay;
pub use render::{RenderConsumer, RenderState, TickOutcome};
pub use source::{FrameSource, Producer, ProducerHandle, SyntheticSource};
pub use surface::{AspectFill, Composite, MemorySurface, Surface};
