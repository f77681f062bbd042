//! Code 128 barcode rasters.

use barcoders::sym::code128::Code128;
use std::io::Write;
use tempfile::NamedTempFile;

use crate::labels::RenderError;

/// Printed barcode size on the label.
pub const BARCODE_WIDTH_MM: f64 = 50.0;
pub const BARCODE_HEIGHT_MM: f64 = 11.0;

/// Blank modules on each side, required by scanners.
const QUIET_ZONE_MODULES: usize = 10;
const MODULE_PX: usize = 3;
const MM_PER_INCH: f64 = 25.4;

/// Code 128 character set B prefix understood by `barcoders`.
const CHARSET_B: char = 'Ɓ';

/// Grayscale bitmap of a barcode, bars only.
#[derive(Debug, Clone, PartialEq)]
pub struct BarcodeRaster {
    pub width: u32,
    pub height: u32,
    /// Resolution that makes the raster `BARCODE_WIDTH_MM` wide.
    pub dpi: f64,
    pub pixels: Vec<u8>,
}

/// Encode `code` and draw it. Pure function of the input.
pub fn rasterize(code: &str) -> Result<BarcodeRaster, RenderError> {
    let barcode = Code128::new(format!("{CHARSET_B}{code}")).map_err(|e| RenderError::Barcode {
        code: code.to_string(),
        reason: e.to_string(),
    })?;
    let modules = barcode.encode();

    let mut row = Vec::with_capacity((modules.len() + 2 * QUIET_ZONE_MODULES) * MODULE_PX);
    let quiet = std::iter::repeat_n(0u8, QUIET_ZONE_MODULES);
    for module in quiet.clone().chain(modules.iter().copied()).chain(quiet) {
        let shade = if module == 1 { 0 } else { 255 };
        row.extend(std::iter::repeat_n(shade, MODULE_PX));
    }

    let width = row.len();
    let dpi = width as f64 / (BARCODE_WIDTH_MM / MM_PER_INCH);
    let height = ((BARCODE_HEIGHT_MM / MM_PER_INCH) * dpi).round().max(1.0) as usize;

    let mut pixels = Vec::with_capacity(width * height);
    for _ in 0..height {
        pixels.extend_from_slice(&row);
    }

    Ok(BarcodeRaster {
        width: width as u32,
        height: height as u32,
        dpi,
        pixels,
    })
}

/// Encode the raster as an 8-bit grayscale PNG.
pub fn write_png<W: Write>(raster: &BarcodeRaster, out: W) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(out, raster.width, raster.height);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&raster.pixels)?;
    writer.finish()
}

/// Draw `code` into a temporary PNG file. The file is deleted when dropped.
pub fn to_temp_png(code: &str) -> Result<(NamedTempFile, f64), RenderError> {
    let raster = rasterize(code)?;
    let mut tmp = tempfile::Builder::new()
        .prefix("barcode-")
        .suffix(".png")
        .tempfile()
        .map_err(|e| RenderError::Io(e.to_string()))?;
    write_png(&raster, tmp.as_file_mut()).map_err(|e| RenderError::Io(e.to_string()))?;
    tmp.as_file_mut()
        .flush()
        .map_err(|e| RenderError::Io(e.to_string()))?;
    Ok((tmp, raster.dpi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_is_deterministic() {
        assert_eq!(rasterize("0001").unwrap(), rasterize("0001").unwrap());
        assert_ne!(rasterize("0001").unwrap(), rasterize("0002").unwrap());
    }

    #[test]
    fn test_raster_has_quiet_zone_and_bars() {
        let raster = rasterize("ABC-123").unwrap();
        let width = raster.width as usize;
        assert_eq!(raster.pixels.len(), width * raster.height as usize);

        let first_row = &raster.pixels[..width];
        let quiet_px = QUIET_ZONE_MODULES * MODULE_PX;
        assert!(first_row[..quiet_px].iter().all(|&p| p == 255));
        assert!(first_row[width - quiet_px..].iter().all(|&p| p == 255));
        // Code 128 always starts with a bar
        assert_eq!(first_row[quiet_px], 0);
    }

    #[test]
    fn test_raster_physical_size() {
        let raster = rasterize("0001").unwrap();
        let width_mm = raster.width as f64 / raster.dpi * MM_PER_INCH;
        let height_mm = raster.height as f64 / raster.dpi * MM_PER_INCH;
        assert!((width_mm - BARCODE_WIDTH_MM).abs() < 0.01);
        assert!((height_mm - BARCODE_HEIGHT_MM).abs() < 0.5);
    }

    #[test]
    fn test_non_ascii_code_fails() {
        let err = rasterize("код1").unwrap_err();
        assert!(matches!(err, RenderError::Barcode { ref code, .. } if code == "код1"));
    }

    #[test]
    fn test_temp_png_removed_on_drop() {
        let (tmp, dpi) = to_temp_png("0001").unwrap();
        let path = tmp.path().to_path_buf();
        assert!(dpi > 0.0);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        drop(tmp);
        assert!(!path.exists());
    }
}
