use ndarray::{Array4, Ix4, s};

use crate::{
    error::{Result, TensorErr},
    ops::unsupported_grad,
    tensor::Tensor,
};

impl Tensor {
    /// Convolves a batch of images `[B, C, H, W]` with a bank of kernels.
    ///
    /// The images are zero-padded by one pixel on every side, split into patches at `stride`
    /// and multiplied by the flattened kernels. Inference only: a differentiable operand yields
    /// an output whose backward procedure fails with `UnsupportedGradient`.
    ///
    /// # Arguments
    /// * `weight` - The kernels, `[C_out, C, kh, kw]`.
    /// * `bias` - One bias per output channel, `[C_out]`.
    /// * `stride` - The step between two patches.
    ///
    /// # Returns
    /// The feature maps, `[B, C_out, H', W']`.
    pub fn conv2d(&self, weight: &Tensor, bias: &Tensor, stride: usize) -> Result<Tensor> {
        let (w, b) = (weight.dims(), bias.dims());
        if w.len() != 4 || b.len() != 1 || self.ndim() != 4 || w[1] != self.dims()[1] || w[0] != b[0] {
            return Err(TensorErr::ShapeMismatch {
                op: "conv2d",
                lhs: self.shape(),
                rhs: weight.shape(),
            });
        }

        let patches = self.zero_pad()?.image_patches(w[2], w[3], stride)?;
        let (batch, height, width, size) = match *patches.dims() {
            [batch, height, width, size] => (batch, height, width, size),
            _ => {
                return Err(TensorErr::InvalidShape {
                    op: "conv2d",
                    shape: patches.shape(),
                    reason: "expected [B, H, W, P] patches",
                });
            }
        };

        let kernels = weight.reshape(&[w[0], w[1] * w[2] * w[3]])?.transpose()?;
        let out = patches
            .reshape(&[batch * height * width, size])?
            .matmul(&kernels)?
            .add_bias(bias)?;

        out.reshape(&[batch, height * width, w[0]])?
            .transpose()?
            .reshape(&[batch, w[0], height, width])
    }

    /// Surrounds every image of a `[B, C, H, W]` batch with a one pixel border of zeros.
    pub fn zero_pad(&self) -> Result<Tensor> {
        let images = self.images("zero_pad")?;
        let (b, c, h, w) = images.dim();

        let mut padded = Array4::zeros((b, c, h + 2, w + 2));
        padded.slice_mut(s![.., .., 1..=h, 1..=w]).assign(&images);

        Ok(Tensor::from_parts(padded.into_dyn(), unsupported_grad(self, "zero_pad")))
    }

    /// Extracts every `patch_h x patch_w` window of a `[B, C, H, W]` batch at `stride`.
    ///
    /// # Returns
    /// The flattened windows, `[B, H', W', C * patch_h * patch_w]`, channel major.
    pub fn image_patches(&self, patch_h: usize, patch_w: usize, stride: usize) -> Result<Tensor> {
        let images = self.images("image_patches")?;
        let (b, c, h, w) = images.dim();
        if stride == 0 || patch_h == 0 || patch_w == 0 || patch_h > h || patch_w > w {
            return Err(TensorErr::InvalidShape {
                op: "image_patches",
                shape: self.shape(),
                reason: "the patch does not fit the images",
            });
        }

        let out_h = (h - patch_h) / stride + 1;
        let out_w = (w - patch_w) / stride + 1;
        let area = patch_h * patch_w;

        let patches = Array4::from_shape_fn((b, out_h, out_w, c * area), |(n, i, j, p)| {
            let (ch, offset) = (p / area, p % area);
            let (dy, dx) = (offset / patch_w, offset % patch_w);
            images[[n, ch, i * stride + dy, j * stride + dx]]
        });

        Ok(Tensor::from_parts(patches.into_dyn(), unsupported_grad(self, "image_patches")))
    }

    /// Averages every non-overlapping `size x size` window of a `[B, C, H, W]` batch.
    ///
    /// Inference only.
    pub fn avg_pool2d(&self, size: usize) -> Result<Tensor> {
        if self.needs_grad() {
            return Err(TensorErr::UnsupportedGradient { op: "avg_pool2d" });
        }

        let images = self.images("avg_pool2d")?;
        let (b, c, h, w) = images.dim();
        if size == 0 || h % size != 0 || w % size != 0 {
            return Err(TensorErr::InvalidShape {
                op: "avg_pool2d",
                shape: self.shape(),
                reason: "spatial dimensions must be multiples of the window",
            });
        }

        let norm = 1. / (size * size) as f32;
        let pooled = Array4::from_shape_fn((b, c, h / size, w / size), |(n, ch, i, j)| {
            let window = images.slice(s![n, ch, i * size..(i + 1) * size, j * size..(j + 1) * size]);
            window.sum() * norm
        });

        Ok(Tensor::from(pooled.into_dyn()))
    }

    fn images(&self, op: &'static str) -> Result<ndarray::ArrayView4<'_, f32>> {
        self.view()
            .into_dimensionality::<Ix4>()
            .map_err(|_| TensorErr::InvalidShape {
                op,
                shape: self.shape(),
                reason: "expected a [B, C, H, W] batch",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    #[test]
    fn zero_pad_adds_a_border() {
        let x = tensor![[[[1., 2.], [3., 4.]]]];
        let padded = x.zero_pad().unwrap();
        assert_eq!(
            padded,
            tensor![[[
                [0., 0., 0., 0.],
                [0., 1., 2., 0.],
                [0., 3., 4., 0.],
                [0., 0., 0., 0.],
            ]]]
        );
    }

    #[test]
    fn image_patches_are_channel_major() {
        let x = tensor![[[[1., 2., 3.], [4., 5., 6.]], [[-1., -2., -3.], [-4., -5., -6.]]]];
        let patches = x.image_patches(2, 2, 1).unwrap();

        assert_eq!(patches.dims(), &[1, 1, 2, 8]);
        assert_eq!(
            patches.slice(2, 1, 2).unwrap().to_vec(),
            vec![2., 3., 5., 6., -2., -3., -5., -6.]
        );
    }

    #[test]
    fn avg_pool2d_averages_windows() {
        let x = tensor![[[[1., 3., 0., 2.], [5., 7., 4., 6.]]]];
        assert_eq!(x.avg_pool2d(2).unwrap(), tensor![[[[4., 3.]]]]);
        assert!(x.avg_pool2d(3).is_err());
    }

    #[test]
    fn avg_pool2d_refuses_differentiable_inputs() {
        let (x, _) = Tensor::zeros(&[1, 1, 2, 2]).track();
        assert!(matches!(
            x.avg_pool2d(2).unwrap_err(),
            TensorErr::UnsupportedGradient { op: "avg_pool2d" }
        ));
    }

    #[test]
    fn conv2d_backward_is_unsupported() {
        let (x, _) = Tensor::ones(&[1, 1, 4, 4]).track();
        let weight = Tensor::ones(&[2, 1, 3, 3]);
        let bias = Tensor::zeros(&[2]);

        let out = x.conv2d(&weight, &bias, 1).unwrap();
        assert_eq!(out.dims(), &[1, 2, 4, 4]);

        let err = out.backward(Tensor::ones(&[1, 2, 4, 4])).unwrap_err();
        assert!(matches!(err, TensorErr::UnsupportedGradient { .. }));
    }

    #[test]
    fn conv2d_rejects_mismatched_channels() {
        let x = Tensor::zeros(&[1, 2, 4, 4]);
        let err = x
            .conv2d(&Tensor::zeros(&[2, 3, 3, 3]), &Tensor::zeros(&[2]), 1)
            .unwrap_err();
        assert!(matches!(err, TensorErr::ShapeMismatch { op: "conv2d", .. }));
    }
}
