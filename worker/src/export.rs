use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use log::debug;
use solver::PerspectiveSolution;

use crate::{
    Result, WorkerErr,
    pixels::{PixelSource, extract_projected_image},
};

/// The pixel size of an export: the largest `1 x aspect_ratio` box fitting a `side x side` square.
///
/// # Returns
/// The width and height, each at least one pixel, or an error if the ratio is not positive.
pub fn export_size(aspect_ratio: f32, side_length: u32) -> Result<(u32, u32)> {
    if !aspect_ratio.is_finite() || aspect_ratio <= 0. {
        return Err(WorkerErr::InvalidRequest {
            reason: format!("aspect ratio must be positive, got {aspect_ratio}"),
        });
    }

    let (w, h) = (1., aspect_ratio);
    let side = side_length as f32;
    let scale = (side / w).min(side / h);

    Ok((((w * scale) as u32).max(1), ((h * scale) as u32).max(1)))
}

/// Renders the flattened rectangle at the given aspect ratio and encodes it as PNG.
///
/// # Arguments
/// * `source` - The original photo.
/// * `solution` - The solved perspective.
/// * `aspect_ratio` - The height of the output over its width.
/// * `side_length` - The length of the longest output side.
pub fn export_png<S>(
    source: &S,
    solution: &PerspectiveSolution,
    aspect_ratio: f32,
    side_length: u32,
) -> Result<Vec<u8>>
where
    S: PixelSource + ?Sized,
{
    let (width, height) = export_size(aspect_ratio, side_length)?;
    let image = extract_projected_image(source, solution, width, height)?;

    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(image).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    debug!(width = width, height = height, bytes = buf.len(); "encoded export");

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use image::RgbaImage;

    use super::*;
    use crate::pixels::RgbaSource;

    #[test]
    fn size_fits_the_longest_side() {
        assert_eq!(export_size(1., 500).unwrap(), (500, 500));
        assert_eq!(export_size(2., 500).unwrap(), (250, 500));
        assert_eq!(export_size(0.5, 500).unwrap(), (500, 250));
        assert_eq!(export_size(1e-6, 10).unwrap(), (10, 1));
        assert!(export_size(0., 500).is_err());
        assert!(export_size(f32::NAN, 500).is_err());
    }

    #[test]
    fn export_decodes_back_to_the_requested_size() {
        let source = RgbaSource::new(RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255])));
        let solution = PerspectiveSolution::from_slice(&[
            0.1, 0.1, -1., 0.5, 0.8, 0., 0., 0., 0., 0., 0., 0., 0.,
        ])
        .unwrap();

        let png = export_png(&source, &solution, 1.6, 20).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().into_rgba8();

        assert_eq!(decoded.dimensions(), (12, 20));
        assert!(decoded.pixels().all(|p| p.0 == [10, 20, 30, 255]));
    }
}
