//! Capture capability negotiation
//!
//! Host-independent selection of capture format, recording codec and color
//! space. Formats advertise enumerated [`FormatFeature`] flags and are ranked
//! with a weight table; codecs and color spaces are picked from fixed
//! preference orders.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GradeError, Result};

// ============================================================================
// Feature Flags
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatFeature {
    /// Log-encoded color space available
    LogColorSpace,
    /// HLG / BT.2020 HDR color space available
    HlgBt2020,
    /// Cinematic (depth-of-field) video capture
    CinematicVideo,
    StabilizationCinematicExtendedEnhanced,
    StabilizationCinematicExtended,
    StabilizationCinematic,
    StabilizationAuto,
}

/// Score contribution per feature
const FEATURE_WEIGHTS: &[(FormatFeature, i64)] = &[
    (FormatFeature::LogColorSpace, 10_000),
    (FormatFeature::CinematicVideo, 1_000),
    (FormatFeature::HlgBt2020, 500),
    (FormatFeature::StabilizationCinematicExtendedEnhanced, 100),
    (FormatFeature::StabilizationCinematicExtended, 75),
    (FormatFeature::StabilizationCinematic, 50),
    (FormatFeature::StabilizationAuto, 25),
];

/// 4K formats are penalised (bandwidth), 1080p and up favoured
const UHD_PENALTY: i64 = -10_000;
const FULL_HD_BONUS: i64 = 7_000;

// ============================================================================
// Formats
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub width: u32,
    pub height: u32,
    pub max_fps: u32,
    #[serde(default)]
    pub features: HashSet<FormatFeature>,
}

impl FormatDescriptor {
    pub fn new(width: u32, height: u32, max_fps: u32) -> Self {
        Self {
            width,
            height,
            max_fps,
            features: HashSet::new(),
        }
    }

    pub fn with_feature(mut self, feature: FormatFeature) -> Self {
        self.features.insert(feature);
        self
    }

    pub fn supports(&self, feature: FormatFeature) -> bool {
        self.features.contains(&feature)
    }

    pub fn is_uhd(&self) -> bool {
        self.width >= 3840 && self.height >= 2160
    }

    pub fn is_full_hd(&self) -> bool {
        self.width >= 1920 && self.height >= 1080
    }

    /// Rank this format; higher is better.
    pub fn score(&self) -> i64 {
        let mut score = 0;
        if self.is_uhd() {
            score += UHD_PENALTY;
        }
        if self.is_full_hd() {
            score += FULL_HD_BONUS;
        }
        for (feature, weight) in FEATURE_WEIGHTS {
            if self.supports(*feature) {
                score += weight;
            }
        }
        score
    }
}

/// Highest-scoring format. Ties keep the earliest entry.
pub fn select_format(formats: &[FormatDescriptor]) -> Option<&FormatDescriptor> {
    let mut best: Option<(&FormatDescriptor, i64)> = None;
    for format in formats {
        let score = format.score();
        debug!("Format {}x{}@{} scores {}", format.width, format.height, format.max_fps, score);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((format, score)),
        }
    }
    best.map(|(f, _)| f)
}

// ============================================================================
// Codecs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    ProRes422Proxy,
    ProRes422,
    Hevc,
    H264,
}

impl VideoCodec {
    /// Recording preference, best first
    pub const PREFERENCE: [VideoCodec; 4] = [
        VideoCodec::ProRes422Proxy,
        VideoCodec::ProRes422,
        VideoCodec::Hevc,
        VideoCodec::H264,
    ];
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VideoCodec::ProRes422Proxy => "ProRes 422 Proxy",
            VideoCodec::ProRes422 => "ProRes 422",
            VideoCodec::Hevc => "HEVC",
            VideoCodec::H264 => "H.264",
        };
        f.write_str(name)
    }
}

/// First preferred codec the output supports
pub fn negotiate_codec(available: &[VideoCodec]) -> Result<VideoCodec> {
    VideoCodec::PREFERENCE
        .iter()
        .copied()
        .find(|c| available.contains(c))
        .ok_or_else(|| GradeError::Unsupported(format!("no usable codec in {:?}", available)))
}

// ============================================================================
// Color Spaces
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSpace {
    Log,
    HlgBt2020,
    Srgb,
}

impl ColorSpace {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "log" => Some(ColorSpace::Log),
            "hlg" | "hlg_bt2020" | "bt2020" => Some(ColorSpace::HlgBt2020),
            "srgb" => Some(ColorSpace::Srgb),
            _ => None,
        }
    }
}

/// Log if the format has it, then HLG, else sRGB
pub fn preferred_color_space(format: &FormatDescriptor) -> ColorSpace {
    if format.supports(FormatFeature::LogColorSpace) {
        ColorSpace::Log
    } else if format.supports(FormatFeature::HlgBt2020) {
        ColorSpace::HlgBt2020
    } else {
        ColorSpace::Srgb
    }
}
