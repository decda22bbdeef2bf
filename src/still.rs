//! Still-image grading
//!
//! Applies a `.cube` table to an image file using the `image` crate for
//! decoding and encoding. Output format follows the output file extension.

use std::path::Path;

use image::{DynamicImage, RgbaImage};
use tracing::info;

use crate::error::{GradeError, Result};
use crate::frame::PixelFormat;
use crate::grade::apply_lut_in_place;
use crate::lut::LookupTable;

/// Grade an in-memory image, returning RGBA8.
pub fn grade_image(img: &DynamicImage, table: &LookupTable) -> RgbaImage {
    let mut rgba = img.to_rgba8();
    let row_bytes = rgba.width() as usize * 4;
    apply_lut_in_place(&mut rgba, row_bytes, PixelFormat::Rgba8, table);
    rgba
}

/// Load `input`, grade it with `table` and write `output`.
pub fn grade_file(input: &Path, output: &Path, table: &LookupTable) -> Result<()> {
    let img = image::open(input)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(GradeError::InvalidFrame(format!("{} is empty", input.display())));
    }

    let graded = grade_image(&img, table);
    let needs_rgb = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "jpg" | "jpeg"))
        .unwrap_or(false);

    // JPEG has no alpha channel
    if needs_rgb {
        DynamicImage::ImageRgba8(graded).to_rgb8().save(output)?;
    } else {
        graded.save(output)?;
    }

    info!("Graded {} → {}", input.display(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_grade_image_identity() {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(1, 1, Rgba([10, 120, 240, 77]));
        let out = grade_image(&DynamicImage::ImageRgba8(img.clone()), &LookupTable::identity(9));
        assert_eq!(out, img);
    }

    #[test]
    fn test_grade_file_roundtrip_png() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");

        let img = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        img.save(&input).unwrap();

        // Swap red and blue
        let mut cube = String::from("LUT_3D_SIZE 2\n");
        for b in 0..2 {
            for g in 0..2 {
                for r in 0..2 {
                    cube.push_str(&format!("{} {} {}\n", b, g, r));
                }
            }
        }
        let table = LookupTable::parse(cube.as_bytes()).unwrap();
        grade_file(&input, &output, &table).unwrap();

        let graded = image::open(&output).unwrap().to_rgba8();
        assert_eq!(graded.get_pixel(2, 2), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_grade_file_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = grade_file(&dir.path().join("missing.png"), &dir.path().join("o.png"), &LookupTable::identity(2));
        assert!(err.is_err());
    }
}
