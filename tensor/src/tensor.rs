use std::{borrow::Cow, cell::RefCell, fmt, rc::Rc};

use ndarray::{ArcArray, Array, ArrayD, ArrayViewD, Dimension, IxDyn};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::{
    error::{Result, TensorErr},
    shape::Shape,
};

/// The backward procedure of a tensor: receives the gradient of the objective with respect to the
/// tensor and routes it to the tensor's inputs.
pub type GradFn = Rc<dyn Fn(Tensor) -> Result<()>>;

/// A multi-dimensional `f32` array with an optional backward procedure.
///
/// A tensor holding a backward procedure is *differentiable*; one without it is a constant with
/// respect to the current computation. Every operation returns a new tensor and never mutates its
/// operands. Cloning is cheap, the data buffer is shared.
#[derive(Clone)]
pub struct Tensor {
    data: ArcArray<f32, IxDyn>,
    backward: Option<GradFn>,
}

/// Collects the gradients routed into a tracked tensor.
///
/// Every contribution received is summed, so a tracked value may be consumed any number of times.
#[derive(Clone, Default)]
pub struct GradSlot(Rc<RefCell<Option<Tensor>>>);

impl GradSlot {
    /// Takes the accumulated gradient out of the slot, leaving it empty.
    pub fn take(&self) -> Option<Tensor> {
        self.0.borrow_mut().take()
    }

    /// Returns whether some gradient has been received.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_none()
    }

    fn push(&self, grad: Tensor) -> Result<()> {
        let mut slot = self.0.borrow_mut();
        let total = match slot.take() {
            Some(acc) => acc.add(&grad)?,
            None => grad.detach(),
        };
        *slot = Some(total);
        Ok(())
    }
}

impl Tensor {
    /// Wraps an array produced by some operation, normalizing it to a standard layout.
    pub(crate) fn from_parts(data: ArrayD<f32>, backward: Option<GradFn>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };

        Self {
            data: data.into_shared(),
            backward,
        }
    }

    /// Reinterprets the buffer of this tensor with a new shape, sharing its data.
    pub(crate) fn from_shared(data: ArcArray<f32, IxDyn>, backward: Option<GradFn>) -> Self {
        Self { data, backward }
    }

    /// Creates a constant tensor from an array of any dimensionality.
    pub fn from_array<D: Dimension>(array: Array<f32, D>) -> Self {
        Self::from_parts(array.into_dyn(), None)
    }

    /// Creates a tensor filled with zeros.
    pub fn zeros(shape: &[usize]) -> Self {
        Self::from_parts(ArrayD::zeros(IxDyn(shape)), None)
    }

    /// Creates a tensor filled with ones.
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.)
    }

    /// Creates a tensor with every element set to `value`.
    pub fn full(shape: &[usize], value: f32) -> Self {
        Self::from_parts(ArrayD::from_elem(IxDyn(shape), value), None)
    }

    /// Creates a zero-dimensional tensor.
    pub fn scalar(value: f32) -> Self {
        Self::full(&[], value)
    }

    /// Creates a tensor of independent standard normal samples.
    ///
    /// # Arguments
    /// * `shape` - The shape of the tensor.
    /// * `rng` - The random number generator to draw the samples from.
    pub fn randn<R: Rng + ?Sized>(shape: &[usize], rng: &mut R) -> Self {
        let data = ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.sample(StandardNormal));
        Self::from_parts(data, None)
    }

    /// Creates a tensor from a flat row-major buffer.
    ///
    /// # Returns
    /// An error if the amount of values does not match the shape.
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let expected = shape.iter().try_fold(1usize, |n, &d| n.checked_mul(d));
        if expected != Some(data.len()) {
            return Err(TensorErr::DataLength {
                len: data.len(),
                shape: Shape::from(shape),
            });
        }

        Ok(Self::from_parts(ArrayD::from_shape_vec(IxDyn(shape), data)?, None))
    }

    /// Returns the dimension sizes of this tensor.
    pub fn dims(&self) -> &[usize] {
        self.data.shape()
    }

    /// Returns the shape of this tensor.
    pub fn shape(&self) -> Shape {
        Shape::from(self.dims())
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Returns the number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Borrows the underlying array.
    pub fn view(&self) -> ArrayViewD<'_, f32> {
        self.data.view()
    }

    /// Borrows the elements in row-major order.
    pub fn values(&self) -> Cow<'_, [f32]> {
        match self.data.as_slice() {
            Some(values) => Cow::Borrowed(values),
            None => Cow::Owned(self.data.iter().copied().collect()),
        }
    }

    /// Copies the elements in row-major order.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    /// Returns the only element of a single-element tensor.
    pub fn item(&self) -> Result<f32> {
        match self.data.iter().next() {
            Some(&value) if self.numel() == 1 => Ok(value),
            _ => Err(TensorErr::InvalidShape {
                op: "item",
                shape: self.shape(),
                reason: "expected exactly one element",
            }),
        }
    }

    /// Returns whether this tensor carries a backward procedure.
    pub fn needs_grad(&self) -> bool {
        self.backward.is_some()
    }

    pub(crate) fn shared_data(&self) -> ArcArray<f32, IxDyn> {
        self.data.clone()
    }

    pub(crate) fn grad_fn(&self) -> Option<GradFn> {
        self.backward.clone()
    }

    /// Returns a tensor sharing this tensor's data without its backward procedure.
    pub fn detach(&self) -> Self {
        Self {
            data: self.data.clone(),
            backward: None,
        }
    }

    /// Returns a tensor sharing this tensor's data with `backward` as its backward procedure.
    pub fn with_backward<F>(&self, backward: F) -> Self
    where
        F: Fn(Tensor) -> Result<()> + 'static,
    {
        Self {
            data: self.data.clone(),
            backward: Some(Rc::new(backward)),
        }
    }

    /// Turns a detached copy of this tensor into a differentiable leaf.
    ///
    /// # Returns
    /// The leaf and the slot its gradients are summed into.
    pub fn track(&self) -> (Self, GradSlot) {
        let slot = GradSlot::default();
        let sink = slot.clone();
        (self.with_backward(move |grad| sink.push(grad)), slot)
    }

    /// Runs the backward procedure of this tensor.
    ///
    /// # Arguments
    /// * `grad` - The gradient of the objective with respect to this tensor.
    ///
    /// # Returns
    /// An error if `grad` has a different shape or some operation in the graph can't be
    /// differentiated.
    pub fn backward(&self, grad: Tensor) -> Result<()> {
        if grad.dims() != self.dims() {
            return Err(TensorErr::ShapeMismatch {
                op: "backward",
                lhs: self.shape(),
                rhs: grad.shape(),
            });
        }

        match &self.backward {
            Some(backward) => backward(grad),
            None => Ok(()),
        }
    }

    /// Applies `f` to a detached view of this tensor and merges every gradient `f` routes into
    /// that view into a single call to this tensor's backward procedure.
    ///
    /// Required whenever `f` consumes its input more than once.
    pub fn accum_grad<F>(&self, f: F) -> Result<Tensor>
    where
        F: FnOnce(&Tensor) -> Result<Tensor>,
    {
        let Some(upstream) = self.grad_fn() else {
            return Ok(f(&self.detach())?.detach());
        };

        let (input, slot) = self.track();
        let output = f(&input)?;
        let inner = output.grad_fn();

        Ok(output.with_backward(move |grad| {
            slot.take();
            if let Some(inner) = &inner {
                inner(grad)?;
            }

            match slot.take() {
                Some(total) => upstream(total),
                None => Ok(()),
            }
        }))
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(value: ArrayD<f32>) -> Self {
        Self::from_parts(value, None)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .field("data", &self.data)
            .field("needs_grad", &self.needs_grad())
            .finish()
    }
}

impl PartialEq for Tensor {
    /// Two tensors are equal when their shapes and values are, regardless of their graphs.
    fn eq(&self, other: &Self) -> bool {
        self.dims() == other.dims() && self.data.iter().eq(other.data.iter())
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::tensor;

    #[test]
    fn from_vec_checks_element_count() {
        let err = Tensor::from_vec(vec![1., 2., 3.], &[2, 2]).unwrap_err();
        assert!(matches!(err, TensorErr::DataLength { len: 3, .. }));

        let err = Tensor::from_vec(vec![1.], &[usize::MAX, 2]).unwrap_err();
        assert!(matches!(err, TensorErr::DataLength { len: 1, .. }));
    }

    #[test]
    fn detach_shares_data_and_drops_backward() {
        let (x, _) = tensor![1., 2.].track();
        let detached = x.detach();

        assert!(x.needs_grad());
        assert!(!detached.needs_grad());
        assert_eq!(x, detached);
    }

    #[test]
    fn backward_rejects_wrong_gradient_shape() {
        let (x, _) = tensor![1., 2.].track();
        let err = x.backward(Tensor::zeros(&[3])).unwrap_err();
        assert!(matches!(err, TensorErr::ShapeMismatch { op: "backward", .. }));
    }

    #[test]
    fn track_sums_repeated_contributions() {
        let (x, slot) = tensor![1., 2.].track();
        x.backward(tensor![1., 1.]).unwrap();
        x.backward(tensor![2., -1.]).unwrap();

        assert_eq!(slot.take().unwrap(), tensor![3., 0.]);
        assert!(slot.is_empty());
    }

    #[test]
    fn randn_is_reproducible_with_a_seed() {
        let a = Tensor::randn(&[4, 13], &mut StdRng::seed_from_u64(7));
        let b = Tensor::randn(&[4, 13], &mut StdRng::seed_from_u64(7));

        assert_eq!(a.dims(), &[4, 13]);
        assert_eq!(a, b);
    }

    #[test]
    fn item_requires_a_single_element() {
        assert_eq!(Tensor::scalar(3.).item().unwrap(), 3.);
        assert!(tensor![1., 2.].item().is_err());
    }
}
