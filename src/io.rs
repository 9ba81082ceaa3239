use image::codecs::png::PngEncoder;
use image::{ImageError, Rgb, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::canvas::Grid;
use crate::components::palette::Palette;
use crate::error::PaletteError;

// ============================================================================
// PALETTE FILES
// ============================================================================

/// Bytes per palette record (`R, G, B`; no alpha, no header).
pub const PALETTE_RECORD_LEN: usize = 3;

/// Decode a raw palette buffer into RGB records.
pub fn parse_palette(bytes: &[u8]) -> Result<Vec<Rgb<u8>>, PaletteError> {
    if bytes.len() % PALETTE_RECORD_LEN != 0 {
        return Err(PaletteError::Truncated { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(PALETTE_RECORD_LEN)
        .map(|rec| Rgb([rec[0], rec[1], rec[2]]))
        .collect())
}

pub fn encode_palette(colors: &[Rgb<u8>]) -> Vec<u8> {
    colors.iter().flat_map(|c| c.0).collect()
}

/// Read a palette file to EOF. The palette is named after the file stem.
pub fn read_palette(path: &Path, width: u32, cell_size: u32) -> Result<Palette, PaletteError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    let colors = parse_palette(&bytes)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    crate::log_info!("loaded palette '{}' ({} colours) from {}", name, colors.len(), path.display());
    Ok(Palette::from_rgb(name, &colors, width, cell_size))
}

/// Write one RGB triplet per swatch, in order. Alpha is dropped.
pub fn write_palette(palette: &Palette, path: &Path) -> Result<(), PaletteError> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&encode_palette(&palette.to_rgb()))?;
    writer.flush()?;
    Ok(())
}

// ============================================================================
// IMAGE EXPORT
// ============================================================================

/// One image pixel per grid cell, straight RGBA.
pub fn grid_to_image(grid: &Grid) -> RgbaImage {
    let mut img = RgbaImage::new(grid.width(), grid.height());
    for cell in grid.cells() {
        img.put_pixel(cell.x, cell.y, cell.value);
    }
    img
}

pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), ImageError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let encoder = PngEncoder::new(&mut writer);
    #[allow(deprecated)]
    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::tempdir;

    #[test]
    fn palette_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("warm.pal");
        let palette = Palette::new(
            "warm",
            vec![Rgba([255, 0, 0, 255]), Rgba([255, 128, 0, 10])],
            40,
            20,
        );
        write_palette(&palette, &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), vec![255, 0, 0, 255, 128, 0]);

        let loaded = read_palette(&path, 40, 20).unwrap();
        assert_eq!(loaded.name, "warm");
        assert_eq!(loaded.colors(), &[Rgba([255, 0, 0, 255]), Rgba([255, 128, 0, 255])]);
    }

    #[test]
    fn partial_record_is_rejected() {
        assert!(matches!(
            parse_palette(&[1, 2, 3, 4]),
            Err(PaletteError::Truncated { len: 4 })
        ));
        assert!(parse_palette(&[]).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = read_palette(&dir.path().join("nope.pal"), 10, 10).unwrap_err();
        assert!(matches!(err, PaletteError::Io(_)));
    }

    #[test]
    fn png_export_preserves_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("grid.png");
        let mut grid = Grid::new(3, 2);
        grid.set(2, 1, Rgba([1, 2, 3, 4])).unwrap();

        save_png(&grid_to_image(&grid), &path).unwrap();
        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back.dimensions(), (3, 2));
        assert_eq!(*back.get_pixel(2, 1), Rgba([1, 2, 3, 4]));
        assert_eq!(*back.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
    }
}
