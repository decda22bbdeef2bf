//! 3-D Color Lookup Tables
//!
//! Parses `.cube` color grades and keeps the active table behind an atomic
//! pointer so the grading thread can read it while a reload is in flight.
//!
//! ## Format
//!
//! - `#` comments and blank lines are skipped
//! - `LUT_3D_SIZE <N>` declares the cube edge (required, once, before data)
//! - `TITLE`, `DOMAIN_MIN`, `DOMAIN_MAX`, `LUT_3D_INPUT_RANGE` are accepted and ignored
//! - every other line is an `R G B` triple; red varies fastest, then green, then blue
//!
//! Each triple is stored as an RGBA entry with alpha fixed at `1.0`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use framegrade::lut::{LookupTable, LutStore};
//!
//! let store = LutStore::new(LookupTable::identity(2));
//! store.reload_from_path(Path::new("grade.cube"))?;
//! let table = store.current();
//! ```

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, info, warn};

use crate::error::{GradeError, Result};

/// Largest cube edge accepted (256³ entries is already 256 MiB of f32s)
pub const MAX_CUBE_SIZE: usize = 256;

// ============================================================================
// Lookup Table
// ============================================================================

/// Immutable RGBA color cube
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    size: usize,
    title: Option<String>,
    data: Vec<f32>,
}

impl LookupTable {
    /// Parse `.cube` text.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| GradeError::MalformedAsset(format!("not UTF-8 text: {}", e)))?;

        let mut size: Option<usize> = None;
        let mut title = None;
        let mut data: Vec<f32> = Vec::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut tokens = line.split_whitespace();
            let Some(first) = tokens.next() else { continue };

            match first {
                "LUT_3D_SIZE" => {
                    if size.is_some() {
                        return Err(GradeError::MalformedAsset(format!(
                            "line {}: duplicate LUT_3D_SIZE",
                            line_no
                        )));
                    }
                    if !data.is_empty() {
                        return Err(GradeError::MalformedAsset(format!(
                            "line {}: LUT_3D_SIZE after table data",
                            line_no
                        )));
                    }
                    let n = parse_size(tokens.next(), line_no)?;
                    if tokens.next().is_some() {
                        return Err(GradeError::MalformedAsset(format!(
                            "line {}: trailing tokens after LUT_3D_SIZE",
                            line_no
                        )));
                    }
                    size = Some(n);
                }
                "LUT_1D_SIZE" => {
                    return Err(GradeError::MalformedAsset(format!(
                        "line {}: 1-D tables are not supported",
                        line_no
                    )));
                }
                "TITLE" => {
                    title = Some(line["TITLE".len()..].trim().trim_matches('"').to_string());
                }
                "DOMAIN_MIN" | "DOMAIN_MAX" | "LUT_3D_INPUT_RANGE" => {
                    debug!("Ignoring .cube directive on line {}: {}", line_no, first);
                }
                _ => {
                    let Some(n) = size else {
                        return Err(GradeError::MalformedAsset(format!(
                            "line {}: table data before LUT_3D_SIZE",
                            line_no
                        )));
                    };
                    // Grows with the data actually present, never from the header alone
                    if data.len() == n * n * n * 4 {
                        return Err(GradeError::MalformedAsset(format!(
                            "line {}: more than {} entries for LUT_3D_SIZE {}",
                            line_no,
                            n * n * n,
                            n
                        )));
                    }
                    let [r, g, b] = parse_triple(line, line_no)?;
                    data.extend_from_slice(&[r, g, b, 1.0]);
                }
            }
        }

        let size = size.ok_or_else(|| {
            GradeError::MalformedAsset("missing LUT_3D_SIZE directive".to_string())
        })?;

        let expected = size * size * size * 4;
        if data.len() != expected {
            return Err(GradeError::MalformedAsset(format!(
                "LUT_3D_SIZE {} needs {} entries, found {}",
                size,
                size * size * size,
                data.len() / 4
            )));
        }

        Ok(Self { size, title, data })
    }

    /// Read and parse a `.cube` file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    /// Identity cube of edge `size` (clamped to `2..=MAX_CUBE_SIZE`).
    pub fn identity(size: usize) -> Self {
        let n = size.clamp(2, MAX_CUBE_SIZE);
        let step = 1.0 / (n - 1) as f32;
        let mut data = Vec::with_capacity(n * n * n * 4);
        for b in 0..n {
            for g in 0..n {
                for r in 0..n {
                    data.extend_from_slice(&[r as f32 * step, g as f32 * step, b as f32 * step, 1.0]);
                }
            }
        }
        Self {
            size: n,
            title: Some("identity".to_string()),
            data,
        }
    }

    /// Cube edge length `N`
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Flat RGBA entries, `N³ × 4` floats
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// RGBA entry at lattice point (r, g, b)
    #[inline]
    pub fn entry(&self, r: usize, g: usize, b: usize) -> [f32; 4] {
        let idx = ((b * self.size + g) * self.size + r) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    /// Trilinear lookup of a normalized RGB color.
    ///
    /// Inputs are clamped to `[0, 1]` before indexing.
    #[inline]
    pub fn sample(&self, r: f32, g: f32, b: f32) -> [f32; 3] {
        let max = (self.size - 1) as f32;
        let (r0, r1, fr) = lattice(r, max);
        let (g0, g1, fg) = lattice(g, max);
        let (b0, b1, fb) = lattice(b, max);

        let c000 = self.entry(r0, g0, b0);
        let c100 = self.entry(r1, g0, b0);
        let c010 = self.entry(r0, g1, b0);
        let c110 = self.entry(r1, g1, b0);
        let c001 = self.entry(r0, g0, b1);
        let c101 = self.entry(r1, g0, b1);
        let c011 = self.entry(r0, g1, b1);
        let c111 = self.entry(r1, g1, b1);

        let mut out = [0.0f32; 3];
        for c in 0..3 {
            let x00 = lerp(c000[c], c100[c], fr);
            let x10 = lerp(c010[c], c110[c], fr);
            let x01 = lerp(c001[c], c101[c], fr);
            let x11 = lerp(c011[c], c111[c], fr);
            let y0 = lerp(x00, x10, fg);
            let y1 = lerp(x01, x11, fg);
            out[c] = lerp(y0, y1, fb);
        }
        out
    }

    /// Short human-readable description
    pub fn summary(&self) -> String {
        format!(
            "{} ({}³ = {} entries, {} floats)",
            self.title.as_deref().unwrap_or("untitled"),
            self.size,
            self.size * self.size * self.size,
            self.data.len()
        )
    }
}

/// Split a normalized coordinate into the two neighbouring lattice indices
/// and the fractional weight between them.
#[inline]
fn lattice(v: f32, max: f32) -> (usize, usize, f32) {
    let x = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) * max };
    let i0 = x.floor();
    let i1 = (i0 + 1.0).min(max);
    (i0 as usize, i1 as usize, x - i0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn parse_size(token: Option<&str>, line_no: usize) -> Result<usize> {
    let token = token.ok_or_else(|| {
        GradeError::MalformedAsset(format!("line {}: LUT_3D_SIZE without a value", line_no))
    })?;
    let n: i64 = token.parse().map_err(|_| {
        GradeError::MalformedAsset(format!("line {}: LUT_3D_SIZE '{}' is not an integer", line_no, token))
    })?;
    if n <= 0 {
        return Err(GradeError::MalformedAsset(format!(
            "line {}: LUT_3D_SIZE must be positive, got {}",
            line_no, n
        )));
    }
    if n as usize > MAX_CUBE_SIZE {
        return Err(GradeError::MalformedAsset(format!(
            "line {}: LUT_3D_SIZE {} exceeds {}",
            line_no, n, MAX_CUBE_SIZE
        )));
    }
    Ok(n as usize)
}

/// Parse "0.25 0.5 1.0" into exactly three finite floats
fn parse_triple(line: &str, line_no: usize) -> Result<[f32; 3]> {
    let mut out = [0.0f32; 3];
    let mut count = 0;
    for token in line.split_whitespace() {
        if count == 3 {
            return Err(GradeError::MalformedAsset(format!(
                "line {}: expected 3 values, found more",
                line_no
            )));
        }
        let v: f32 = token.parse().map_err(|_| {
            GradeError::MalformedAsset(format!("line {}: '{}' is not a number", line_no, token))
        })?;
        if !v.is_finite() {
            return Err(GradeError::MalformedAsset(format!(
                "line {}: non-finite value '{}'",
                line_no, token
            )));
        }
        out[count] = v;
        count += 1;
    }
    if count != 3 {
        return Err(GradeError::MalformedAsset(format!(
            "line {}: expected 3 values, found {}",
            line_no, count
        )));
    }
    Ok(out)
}

// ============================================================================
// Table Store
// ============================================================================

/// Holder of the active table.
///
/// Readers get a full snapshot; a replacement is swapped in only after it has
/// parsed successfully.
pub struct LutStore {
    current: ArcSwap<LookupTable>,
}

impl LutStore {
    pub fn new(table: LookupTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(table),
        }
    }

    /// Snapshot of the active table
    pub fn current(&self) -> Arc<LookupTable> {
        self.current.load_full()
    }

    /// Replace the active table wholesale.
    pub fn replace(&self, table: LookupTable) {
        info!("🎨 LUT swapped: {}", table.summary());
        self.current.store(Arc::new(table));
    }

    /// Parse `bytes` and swap on success. On error the previous table stays active.
    pub fn reload_from_bytes(&self, bytes: &[u8]) -> Result<()> {
        match LookupTable::parse(bytes) {
            Ok(table) => {
                self.replace(table);
                Ok(())
            }
            Err(e) => {
                warn!("LUT reload rejected, keeping previous table: {}", e);
                Err(e)
            }
        }
    }

    /// Read a `.cube` file and swap on success.
    pub fn reload_from_path(&self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.reload_from_bytes(&bytes)
    }
}

impl Default for LutStore {
    fn default() -> Self {
        Self::new(LookupTable::identity(2))
    }
}

// ============================================================================
// Tests
// ============================================================================
