use std::path::Path;

use image::{DynamicImage, RgbaImage};
use log::debug;
use solver::PerspectiveSolution;
use tensor::Tensor;

use crate::{Result, WorkerErr};

/// Keeps bilinear samples strictly inside the image.
const EDGE_EPS: f32 = 1e-5;

/// The side of the square rendered for the aspect-ratio classifier, before pooling.
pub const PREVIEW_SIDE: u32 = 128;

/// Maps image coordinates to colours.
pub trait PixelSource {
    /// Samples the colour at every point of a batch.
    ///
    /// # Arguments
    /// * `coords` - The `[N, 2]` points, `(0, 0)` and `(1, 1)` being opposite image corners.
    ///
    /// # Returns
    /// The `[N, 4]` RGBA colours, in `[0, 255]`.
    fn sample(&self, coords: &Tensor) -> Result<Tensor>;
}

/// A decoded RGBA image sampled with clamped bilinear interpolation.
#[derive(Clone, Debug)]
pub struct RgbaSource {
    image: RgbaImage,
}

impl RgbaSource {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Decodes the image file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)?;
        debug!(width = image.width(), height = image.height(); "decoded {}", path.display());
        Ok(Self::from(image))
    }

    /// Wraps a row-major RGBA buffer.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let len = data.len();
        RgbaImage::from_raw(width, height, data)
            .map(Self::new)
            .ok_or_else(|| WorkerErr::InvalidRequest {
                reason: format!("{len} bytes is not a {width}x{height} RGBA image"),
            })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    fn channel(&self, x: u32, y: u32, k: usize) -> f32 {
        self.image.get_pixel(x, y).0[k] as f32
    }
}

impl From<DynamicImage> for RgbaSource {
    fn from(image: DynamicImage) -> Self {
        Self::new(image.into_rgba8())
    }
}

impl PixelSource for RgbaSource {
    fn sample(&self, coords: &Tensor) -> Result<Tensor> {
        if coords.ndim() != 2 || coords.dims()[1] != 2 {
            return Err(WorkerErr::InvalidRequest {
                reason: format!("expected [N, 2] coordinates, got {}", coords.shape()),
            });
        }
        let (width, height) = (self.width(), self.height());
        if width == 0 || height == 0 {
            return Err(WorkerErr::InvalidRequest {
                reason: "cannot sample an empty image".to_string(),
            });
        }

        let x_scale = (width - 1) as f32 - EDGE_EPS;
        let y_scale = (height - 1) as f32 - EDGE_EPS;

        let mut out = Vec::with_capacity(coords.dims()[0] * 4);
        for point in coords.values().chunks(2) {
            let x = point[0].clamp(0., 1.) * x_scale.max(0.);
            let y = point[1].clamp(0., 1.) * y_scale.max(0.);
            let (min_x, min_y) = (x.floor(), y.floor());
            let (frac_x, frac_y) = (x - min_x, y - min_y);
            let (x0, y0) = (min_x as u32, min_y as u32);
            let (x1, y1) = ((x0 + 1).min(width - 1), (y0 + 1).min(height - 1));

            for k in 0..4 {
                let top = self.channel(x0, y0, k) * (1. - frac_x) + self.channel(x1, y0, k) * frac_x;
                let bottom = self.channel(x0, y1, k) * (1. - frac_x) + self.channel(x1, y1, k) * frac_x;
                out.push((top * (1. - frac_y) + bottom * frac_y).round());
            }
        }

        Ok(Tensor::from_vec(out, &[coords.dims()[0], 4])?)
    }
}

/// Renders the rectangle described by `solution` into a `width x height` image.
///
/// Every destination row is mapped through the solution's projector and sampled from `source`.
pub fn extract_projected_image<S>(
    source: &S,
    solution: &PerspectiveSolution,
    width: u32,
    height: u32,
) -> Result<RgbaImage>
where
    S: PixelSource + ?Sized,
{
    if width == 0 || height == 0 {
        return Err(WorkerErr::InvalidRequest {
            reason: format!("cannot render a {width}x{height} image"),
        });
    }

    let projector = solution.projector()?;
    let [w, h] = solution.size()?;
    let (scale_x, scale_y) = (w / width as f32, h / height as f32);

    let mut buf = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        let scaled_y = y as f32 * scale_y;
        let row: Vec<f32> = (0..width)
            .flat_map(|x| [x as f32 * scale_x, scaled_y])
            .collect();
        let row = Tensor::from_vec(row, &[width as usize, 2])?;

        let pixels = source.sample(&projector.project(&row)?)?;
        buf.extend(pixels.values().iter().map(|&v| v.clamp(0., 255.) as u8));
    }

    RgbaImage::from_raw(width, height, buf).ok_or_else(|| WorkerErr::InvalidRequest {
        reason: "rendered buffer does not match the image size".to_string(),
    })
}

/// Converts the RGB channels of an image into a `[1, 3, H, W]` tensor scaled to `[0, 1]`.
pub fn image_tensor(image: &RgbaImage) -> Result<Tensor> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let mut values = vec![0.; 3 * width * height];
    for (x, y, pixel) in image.enumerate_pixels() {
        for k in 0..3 {
            values[(k * height + y as usize) * width + x as usize] = pixel.0[k] as f32 / 255.;
        }
    }

    Ok(Tensor::from_vec(values, &[1, 3, height, width])?)
}

/// Builds the `[1, 3, 64, 64]` input of the aspect-ratio classifier: the rectangle rendered as a
/// square regardless of its proportions, then pooled by two.
pub fn stretch_preview<S>(source: &S, solution: &PerspectiveSolution) -> Result<Tensor>
where
    S: PixelSource + ?Sized,
{
    let square = extract_projected_image(source, solution, PREVIEW_SIDE, PREVIEW_SIDE)?;
    Ok(image_tensor(&square)?.avg_pool2d(2)?)
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn checker() -> RgbaSource {
        RgbaSource::from_raw(
            2,
            2,
            vec![
                0, 0, 0, 255, 200, 100, 0, 255, //
                100, 50, 250, 255, 40, 50, 30, 255,
            ],
        )
        .unwrap()
    }

    #[test]
    fn corners_sample_the_corner_pixels() {
        let source = checker();
        let coords = Tensor::from_vec(vec![0., 0., 1., 0., 0., 1., -3., 7.], &[4, 2]).unwrap();
        let pixels = source.sample(&coords).unwrap().to_vec();

        assert_eq!(pixels[0..4], [0., 0., 0., 255.]);
        assert_eq!(pixels[4..8], [200., 100., 0., 255.]);
        assert_eq!(pixels[8..12], [100., 50., 250., 255.]);
        assert_eq!(pixels[12..16], [100., 50., 250., 255.]);
    }

    #[test]
    fn centre_is_the_rounded_average() {
        let source = checker();
        let pixels = source
            .sample(&Tensor::from_vec(vec![0.5, 0.5], &[1, 2]).unwrap())
            .unwrap()
            .to_vec();
        assert_eq!(pixels, [85., 50., 70., 255.]);
    }

    #[test]
    fn raw_buffers_must_match_their_size() {
        assert!(RgbaSource::from_raw(3, 3, vec![0; 4]).is_err());
    }

    #[test]
    fn identity_projection_copies_the_image() {
        let mut image = RgbaImage::new(3, 3);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            *pixel = Rgba([x as u8 * 100, y as u8 * 100, 7, 255]);
        }
        let source = RgbaSource::new(image.clone());
        let solution = PerspectiveSolution::from_slice(&[
            0., 0., -1., 1.5, 1.5, 0., 0., 0., 0., 0., 0., 0., 0.,
        ])
        .unwrap();

        let rendered = extract_projected_image(&source, &solution, 3, 3).unwrap();
        assert_eq!(rendered, image);
    }

    #[test]
    fn image_tensor_is_channel_major() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(1, 0, Rgba([255, 51, 0, 255]));

        let t = image_tensor(&image).unwrap();
        assert_eq!(t.dims(), &[1, 3, 1, 2]);
        assert_eq!(t.to_vec(), [0., 1., 0., 0.2, 0., 0.]);
    }

    #[test]
    fn preview_is_pooled_to_sixty_four() {
        let source = checker();
        let solution = PerspectiveSolution::from_slice(&[
            0., 0., -1., 1., 1., 0., 0., 0., 0., 0., 0., 0., 0.,
        ])
        .unwrap();

        let preview = stretch_preview(&source, &solution).unwrap();
        assert_eq!(preview.dims(), &[1, 3, 64, 64]);
        assert!(preview.to_vec().iter().all(|v| (0. ..=1.).contains(v)));
    }
}
