use log::debug;
use tensor::{GradSlot, Tensor};

use crate::{
    Result, SolverErr,
    adam::Adam,
    camera::{project, rotation_matrix},
};

/// The amount of scalars of a flat solution vector.
pub const FLAT_LEN: usize = 13;

/// A field of a [`PerspectiveSolution`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Origin,
    Size,
    Rotation,
    Translation,
    PostTranslation,
}

impl Field {
    /// Every field, in flat vector order.
    pub const ALL: [Field; 5] = [
        Field::Origin,
        Field::Size,
        Field::Rotation,
        Field::Translation,
        Field::PostTranslation,
    ];

    /// The fields refined by the optimizer; the post-translation stays fixed.
    pub const OPTIMIZED: [Field; 4] = [
        Field::Origin,
        Field::Size,
        Field::Rotation,
        Field::Translation,
    ];

    /// The amount of scalars held by this field.
    pub const fn len(self) -> usize {
        match self {
            Field::Origin | Field::Rotation | Field::Translation => 3,
            Field::Size | Field::PostTranslation => 2,
        }
    }
}

/// The pose and shape of a planar rectangle seen by a pinhole camera.
#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveSolution {
    /// The first corner of the rectangle, `[3]`.
    pub origin: Tensor,
    /// The width and height of the rectangle in its own plane, `[2]`.
    pub size: Tensor,
    /// The Euler angles of the camera rotation, `[3]`.
    pub rotation: Tensor,
    /// The camera translation, `[3]`.
    pub translation: Tensor,
    /// The image plane offset, `[2]`.
    pub post_translation: Tensor,
}

/// The outcome of refining a solution.
#[derive(Clone, Debug)]
pub struct Refinement {
    pub solution: PerspectiveSolution,
    pub initial_loss: f32,
    pub final_loss: f32,
}

impl PerspectiveSolution {
    /// Splits a flat `[13]` vector into its fields.
    pub fn from_flat_vec(sample: &Tensor) -> Result<Self> {
        if sample.dims() != [FLAT_LEN] {
            return Err(SolverErr::InvalidSample {
                shape: sample.shape(),
            });
        }

        let mut start = 0;
        let mut next = |field: Field| -> Result<Tensor> {
            let end = start + field.len();
            let slice = sample.slice(0, start, end)?;
            start = end;
            Ok(slice)
        };

        Ok(Self {
            origin: next(Field::Origin)?,
            size: next(Field::Size)?,
            rotation: next(Field::Rotation)?,
            translation: next(Field::Translation)?,
            post_translation: next(Field::PostTranslation)?,
        })
    }

    /// Splits a flat slice of 13 values into its fields.
    pub fn from_slice(values: &[f32]) -> Result<Self> {
        Self::from_flat_vec(&Tensor::from_vec(values.to_vec(), &[values.len()])?)
    }

    /// A solution with every field set to zero.
    pub fn zeros() -> Self {
        Self::from_fn(|field| Tensor::zeros(&[field.len()]))
    }

    fn from_fn(mut f: impl FnMut(Field) -> Tensor) -> Self {
        Self {
            origin: f(Field::Origin),
            size: f(Field::Size),
            rotation: f(Field::Rotation),
            translation: f(Field::Translation),
            post_translation: f(Field::PostTranslation),
        }
    }

    pub fn field(&self, field: Field) -> &Tensor {
        match field {
            Field::Origin => &self.origin,
            Field::Size => &self.size,
            Field::Rotation => &self.rotation,
            Field::Translation => &self.translation,
            Field::PostTranslation => &self.post_translation,
        }
    }

    pub fn field_mut(&mut self, field: Field) -> &mut Tensor {
        match field {
            Field::Origin => &mut self.origin,
            Field::Size => &mut self.size,
            Field::Rotation => &mut self.rotation,
            Field::Translation => &mut self.translation,
            Field::PostTranslation => &mut self.post_translation,
        }
    }

    /// Concatenates the fields into a flat `[13]` vector.
    pub fn to_flat_vec(&self) -> Result<Tensor> {
        let fields: Vec<Tensor> = Field::ALL.iter().map(|&f| self.field(f).clone()).collect();
        Ok(Tensor::cat(&fields, 0)?)
    }

    /// Returns `self + scale * other`, field by field.
    pub fn add_scaled(&self, other: &PerspectiveSolution, scale: f32) -> Result<Self> {
        let mut out = self.clone();
        for field in Field::ALL {
            *out.field_mut(field) = self.field(field).add(&other.field(field).scale(scale))?;
        }
        Ok(out)
    }

    /// Evaluates `loss_fn` on a differentiable copy of this solution.
    ///
    /// # Returns
    /// The scalar loss and its gradient with respect to every field, zero for fields the loss
    /// does not depend on.
    pub fn loss_and_grad<F>(&self, loss_fn: F) -> Result<(f32, PerspectiveSolution)>
    where
        F: FnOnce(&PerspectiveSolution) -> Result<Tensor>,
    {
        let mut slots: Vec<GradSlot> = Vec::with_capacity(Field::ALL.len());
        let tracked = Self::from_fn(|field| {
            let (leaf, slot) = self.field(field).track();
            slots.push(slot);
            leaf
        });

        let loss = loss_fn(&tracked)?;
        let value = loss.item()?;
        loss.backward(Tensor::ones(loss.dims()))?;

        let mut slots = slots.into_iter();
        let grad = Self::from_fn(|field| {
            slots
                .next()
                .and_then(|slot| slot.take())
                .unwrap_or_else(|| Tensor::zeros(&[field.len()]))
        });

        Ok((value, grad))
    }

    /// The rotation matrix of this solution, `[3, 3]`.
    pub fn rotation_matrix(&self) -> Result<Tensor> {
        rotation_matrix(&self.rotation)
    }

    /// The four corners of the rectangle in world space, `[4, 3]`, counterclockwise from the
    /// origin.
    pub fn corners(&self) -> Result<Tensor> {
        let offsets = self.size.accum_grad(|size| {
            let zero = Tensor::zeros(&[1]);
            let width = Tensor::cat(&[size.slice(0, 0, 1)?, Tensor::zeros(&[2])], 0)?;
            let height = Tensor::cat(&[zero.clone(), size.slice(0, 1, 2)?, zero.clone()], 0)?;
            let both = Tensor::cat(&[size.clone(), zero], 0)?;

            Tensor::cat(
                &[
                    Tensor::zeros(&[1, 3]),
                    width.unsqueeze(0)?,
                    both.unsqueeze(0)?,
                    height.unsqueeze(0)?,
                ],
                0,
            )
        })?;

        Ok(self.origin.unsqueeze(0)?.repeat(0, 4)?.add(&offsets)?)
    }

    /// The mean squared error between the projected corners and the observed ones.
    ///
    /// # Arguments
    /// * `corners` - The observed corners, `[4, 2]`.
    pub fn projection_mse(&self, corners: &Tensor) -> Result<Tensor> {
        if corners.dims() != [4, 2] {
            return Err(SolverErr::InvalidInput {
                expected: "four [x, y] corners",
                shape: corners.shape(),
            });
        }

        let projected = project(
            &self.rotation_matrix()?,
            &self.translation,
            &self.post_translation,
            &self.corners()?,
        )?;

        Ok(corners.sub(&projected)?.pow(2.).mean_all())
    }

    /// Refines this solution against `corners` for a fixed amount of iterations.
    ///
    /// Every iteration evaluates the projection error and takes one optimizer step; there is no
    /// early stopping.
    ///
    /// # Arguments
    /// * `corners` - The observed corners, `[4, 2]`.
    /// * `iterations` - The amount of optimizer steps.
    /// * `optimizer` - The optimizer, fresh for every candidate.
    ///
    /// # Returns
    /// The refined solution with the losses observed at the first and last iterations, or a
    /// `NumericDegeneracy` error as soon as the loss stops being finite.
    pub fn iterate(
        &self,
        corners: &Tensor,
        iterations: usize,
        optimizer: &mut Adam,
    ) -> Result<Refinement> {
        let mut solution = self.clone();
        let mut initial_loss = None;
        let mut final_loss = None;

        for i in 0..iterations {
            let (loss, grad) = solution.loss_and_grad(|s| s.projection_mse(corners))?;
            if !loss.is_finite() {
                return Err(SolverErr::NumericDegeneracy {
                    reason: format!("the loss became {loss} at iteration {i}"),
                });
            }

            initial_loss.get_or_insert(loss);
            final_loss = Some(loss);
            solution = optimizer.step(&solution, &grad)?;
        }

        let (initial_loss, final_loss) = match (initial_loss, final_loss) {
            (Some(initial), Some(last)) => (initial, last),
            _ => {
                let loss = solution.projection_mse(corners)?.item()?;
                (loss, loss)
            }
        };
        debug!(
            iterations = iterations,
            initial_loss = initial_loss,
            final_loss = final_loss;
            "refined solution"
        );

        Ok(Refinement {
            solution,
            initial_loss,
            final_loss,
        })
    }

    /// Freezes this solution into a [`Projector`].
    pub fn projector(&self) -> Result<Projector> {
        let origin = self.origin.to_vec();
        let [ox, oy, oz] = origin[..] else {
            return Err(SolverErr::InvalidInput {
                expected: "a [3] origin",
                shape: self.origin.shape(),
            });
        };

        Ok(Projector {
            rotation: self.rotation_matrix()?.detach(),
            translation: self.translation.detach(),
            post_translation: self.post_translation.detach(),
            origin: [ox, oy, oz],
        })
    }

    /// The width and height of the rectangle.
    pub fn size(&self) -> Result<[f32; 2]> {
        match self.size.to_vec()[..] {
            [w, h] => Ok([w, h]),
            _ => Err(SolverErr::InvalidInput {
                expected: "a [2] size",
                shape: self.size.shape(),
            }),
        }
    }
}

/// Maps points of the rectangle's own plane to image coordinates under a fixed solution.
#[derive(Clone, Debug)]
pub struct Projector {
    rotation: Tensor,
    translation: Tensor,
    post_translation: Tensor,
    origin: [f32; 3],
}

impl Projector {
    /// Projects a batch of local points.
    ///
    /// # Arguments
    /// * `points` - The `[N, 2]` points, relative to the rectangle's origin.
    ///
    /// # Returns
    /// The `[N, 2]` image points.
    pub fn project(&self, points: &Tensor) -> Result<Tensor> {
        if points.ndim() != 2 || points.dims()[1] != 2 {
            return Err(SolverErr::InvalidInput {
                expected: "an [N, 2] point batch",
                shape: points.shape(),
            });
        }

        let [ox, oy, oz] = self.origin;
        let lifted: Vec<f32> = points
            .values()
            .chunks(2)
            .flat_map(|p| [p[0] + ox, p[1] + oy, oz])
            .collect();
        let lifted = Tensor::from_vec(lifted, &[points.dims()[0], 3])?;

        project(&self.rotation, &self.translation, &self.post_translation, &lifted)
    }
}

#[cfg(test)]
mod tests {
    use tensor::tensor;

    use super::*;

    const TRUTH: [f32; 13] = [0.3, 0.3, -1., 0.15, 0.15, 0., 0., 0., 0., 0., 0., 0., 0.];

    fn corners() -> Tensor {
        tensor![[0.3, 0.3], [0.45, 0.3], [0.45, 0.45], [0.3, 0.45]]
    }

    #[test]
    fn flat_vector_round_trip() {
        let flat = Tensor::from_vec((0..13).map(|i| i as f32).collect(), &[13]).unwrap();
        let solution = PerspectiveSolution::from_flat_vec(&flat).unwrap();

        assert_eq!(solution.size, tensor![3., 4.]);
        assert_eq!(solution.post_translation, tensor![11., 12.]);
        assert_eq!(solution.to_flat_vec().unwrap(), flat);
    }

    #[test]
    fn flat_vectors_need_thirteen_values() {
        let err = PerspectiveSolution::from_flat_vec(&Tensor::zeros(&[12])).unwrap_err();
        assert!(matches!(err, SolverErr::InvalidSample { .. }));
        assert!(PerspectiveSolution::from_flat_vec(&Tensor::zeros(&[1, 13])).is_err());
    }

    #[test]
    fn add_scaled_touches_every_field() {
        let ones = PerspectiveSolution::from_slice(&[1.; 13]).unwrap();
        let out = PerspectiveSolution::zeros().add_scaled(&ones, -0.5).unwrap();
        assert_eq!(out.to_flat_vec().unwrap(), Tensor::full(&[13], -0.5));
    }

    #[test]
    fn corners_are_offset_by_the_size() {
        let solution = PerspectiveSolution::from_slice(&TRUTH).unwrap();
        let expected = tensor![[0.3, 0.3, -1.], [0.45, 0.3, -1.], [0.45, 0.45, -1.], [0.3, 0.45, -1.]];

        for (a, b) in solution.corners().unwrap().to_vec().iter().zip(expected.to_vec()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn exact_solution_has_no_loss() {
        let solution = PerspectiveSolution::from_slice(&TRUTH).unwrap();
        let loss = solution.projection_mse(&corners()).unwrap().item().unwrap();
        assert!(loss < 1e-12, "{loss}");
    }

    #[test]
    fn loss_gradient_matches_finite_differences() {
        let values = [0.25, 0.32, -1.2, 0.2, 0.1, 0.05, 0.1, -0.05, 0.02, -0.03, 0.1, 0.01, -0.02];
        let solution = PerspectiveSolution::from_slice(&values).unwrap();
        let (loss, grad) = solution
            .loss_and_grad(|s| s.projection_mse(&corners()))
            .unwrap();
        let grad = grad.to_flat_vec().unwrap().to_vec();

        let eval = |values: &[f32]| {
            PerspectiveSolution::from_slice(values)
                .unwrap()
                .projection_mse(&corners())
                .unwrap()
                .item()
                .unwrap()
        };
        assert_eq!(loss, eval(&values));

        let eps = 1e-2;
        for i in 0..FLAT_LEN {
            let mut plus = values;
            let mut minus = values;
            plus[i] += eps;
            minus[i] -= eps;
            let numeric = (eval(&plus) - eval(&minus)) / (2. * eps);
            assert!((grad[i] - numeric).abs() < 1e-2, "{i}: {} vs {numeric}", grad[i]);
        }
    }

    #[test]
    fn unused_fields_get_zero_gradients() {
        let solution = PerspectiveSolution::from_slice(&TRUTH).unwrap();
        let (loss, grad) = solution
            .loss_and_grad(|s| Ok(s.size.pow(2.).sum_all()))
            .unwrap();

        assert!((loss - 0.045).abs() < 1e-6);
        assert_eq!(grad.origin, Tensor::zeros(&[3]));
        assert!((grad.size.to_vec()[0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn refinement_converges_on_an_undistorted_rectangle() {
        let guess = PerspectiveSolution::from_slice(&[
            0.28, 0.32, -1., 0.13, 0.17, 0., 0., 0., 0., 0., 0., 0., 0.,
        ])
        .unwrap();
        let mut adam = Adam::with_learning_rate(0.001).unwrap();

        let refined = guess.iterate(&corners(), 1000, &mut adam).unwrap();
        let mse = refined.solution.projection_mse(&corners()).unwrap().item().unwrap();

        assert!(refined.final_loss < refined.initial_loss);
        assert!(mse < 1e-4, "{mse}");
        for (got, want) in refined.solution.size().unwrap().into_iter().zip([0.15, 0.15]) {
            assert!((got - want).abs() < 0.05 * want, "size {got} != {want}");
        }
        assert_eq!(refined.solution.post_translation, guess.post_translation);
    }

    #[test]
    fn zero_iterations_report_the_current_loss() {
        let solution = PerspectiveSolution::from_slice(&TRUTH).unwrap();
        let mut adam = Adam::with_learning_rate(0.001).unwrap();

        let refined = solution.iterate(&corners(), 0, &mut adam).unwrap();
        assert_eq!(refined.solution, solution);
        assert_eq!(refined.initial_loss, refined.final_loss);
    }

    #[test]
    fn zero_depth_candidates_are_degenerate() {
        let solution = PerspectiveSolution::zeros();
        let mut adam = Adam::with_learning_rate(0.001).unwrap();

        let err = solution.iterate(&corners(), 10, &mut adam).unwrap_err();
        assert!(matches!(err, SolverErr::NumericDegeneracy { .. }));
    }

    #[test]
    fn projector_maps_local_corners_to_the_image() {
        let solution = PerspectiveSolution::from_slice(&TRUTH).unwrap();
        let local = tensor![[0., 0.], [0.15, 0.], [0.15, 0.15], [0., 0.15]];
        let projected = solution.projector().unwrap().project(&local).unwrap();

        for (a, b) in projected.to_vec().iter().zip(corners().to_vec()) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
