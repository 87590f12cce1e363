use crate::{
    Result, SolverErr,
    solution::{Field, PerspectiveSolution},
};

/// The default step size of the refinement.
pub const DEFAULT_LEARNING_RATE: f32 = 0.001;

/// Adam over the optimized fields of a [`PerspectiveSolution`].
#[derive(Clone, Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    epsilon: f32,
    moment1: PerspectiveSolution,
    moment2: PerspectiveSolution,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `learning_rate` - The small coefficient that modulates the size of every step.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance, or an error if the betas are outside `[0, 1)` or `epsilon` is not
    /// positive.
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Result<Self> {
        if !learning_rate.is_finite() {
            return Err(invalid("learning_rate", learning_rate));
        }
        for (name, beta) in [("beta1", beta1), ("beta2", beta2)] {
            if !(0. ..1.).contains(&beta) {
                return Err(invalid(name, beta));
            }
        }
        if epsilon.is_nan() || epsilon <= 0. {
            return Err(invalid("epsilon", epsilon));
        }

        Ok(Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            epsilon,
            moment1: PerspectiveSolution::zeros(),
            moment2: PerspectiveSolution::zeros(),
        })
    }

    /// Creates an optimizer with the usual `0.9`, `0.999` and `1e-8` hyperparameters.
    pub fn with_learning_rate(learning_rate: f32) -> Result<Self> {
        Self::new(learning_rate, 0.9, 0.999, 1e-8)
    }

    /// Takes one step against `grad`.
    ///
    /// # Returns
    /// The updated solution. The post-translation is carried over unchanged.
    pub fn step(
        &mut self,
        solution: &PerspectiveSolution,
        grad: &PerspectiveSolution,
    ) -> Result<PerspectiveSolution> {
        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let scale1 = -lr / (1. - self.beta1_t);
        let scale2 = 1. / (1. - self.beta2_t);

        let mut next = solution.clone();
        for field in Field::OPTIMIZED {
            let g = grad.field(field);

            let m1 = self.moment1.field(field).scale(b1).add(&g.scale(1. - b1))?;
            let m2 = self
                .moment2
                .field(field)
                .scale(b2)
                .add(&g.pow(2.).scale(1. - b2))?;

            let denom = m2.scale(scale2).pow(0.5).add_scalar(eps).pow(-1.);
            let update = m1.scale(scale1).mul(&denom)?;
            *next.field_mut(field) = solution.field(field).detach().add(&update)?;

            *self.moment1.field_mut(field) = m1;
            *self.moment2.field_mut(field) = m2;
        }

        Ok(next)
    }
}

fn invalid(name: &'static str, value: f32) -> SolverErr {
    SolverErr::InvalidHyperparameter { name, value }
}

#[cfg(test)]
mod tests {
    use tensor::Tensor;

    use super::*;

    #[test]
    fn first_step_moves_every_optimized_scalar_by_the_learning_rate() {
        let mut adam = Adam::with_learning_rate(0.01).unwrap();
        let solution = PerspectiveSolution::zeros();
        let grad = PerspectiveSolution::from_slice(&[
            2., -3., 0.5, 1., -1., 4., -0.25, 8., 1., 1., -1., 7., 7.,
        ])
        .unwrap();

        let next = adam.step(&solution, &grad).unwrap().to_flat_vec().unwrap().to_vec();
        let expected = [
            -0.01, 0.01, -0.01, -0.01, 0.01, -0.01, 0.01, -0.01, -0.01, -0.01, 0.01, 0., 0.,
        ];
        for (i, (got, want)) in next.iter().zip(expected).enumerate() {
            assert!((got - want).abs() < 1e-6, "{i}: {got} != {want}");
        }
    }

    #[test]
    fn steps_follow_the_bias_corrected_moments() {
        let mut adam = Adam::with_learning_rate(0.1).unwrap();
        let mut solution = PerspectiveSolution::zeros();
        let mut grad = PerspectiveSolution::zeros();

        let (mut m, mut v, mut x) = (0f64, 0f64, 0f64);
        for (t, g) in [1., -2., 0.5, 3.].into_iter().enumerate() {
            grad.origin = Tensor::from_vec(vec![g, 0., 0.], &[3]).unwrap();
            solution = adam.step(&solution, &grad).unwrap();

            let (g, t) = (g as f64, t as i32 + 1);
            m = 0.9 * m + 0.1 * g;
            v = 0.999 * v + 0.001 * g * g;
            let (m_hat, v_hat) = (m / (1. - 0.9f64.powi(t)), v / (1. - 0.999f64.powi(t)));
            x -= 0.1 * m_hat / (v_hat.sqrt() + 1e-8);

            let got = solution.origin.to_vec()[0] as f64;
            assert!((got - x).abs() < 1e-3, "step {t}: {got} != {x}");
        }
    }

    #[test]
    fn hyperparameters_are_validated() {
        assert!(matches!(
            Adam::new(0.001, 0.9, 0.999, 0.).unwrap_err(),
            SolverErr::InvalidHyperparameter { name: "epsilon", .. }
        ));
        assert!(Adam::new(0.001, 1., 0.999, 1e-8).is_err());
        assert!(Adam::new(f32::NAN, 0.9, 0.999, 1e-8).is_err());
    }
}
