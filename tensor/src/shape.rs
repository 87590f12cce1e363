use std::fmt;

use crate::error::{Result, TensorErr};

/// The logical layout of a tensor: an ordered list of dimension sizes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Shape(Vec<usize>);

/// A single entry of a reshape request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    /// A dimension of known size.
    Fixed(usize),
    /// A dimension computed from the total element count.
    Infer,
}

impl From<usize> for Dim {
    fn from(value: usize) -> Self {
        Self::Fixed(value)
    }
}

impl Shape {
    /// Creates a new `Shape` from its dimensions.
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    /// The shape of a scalar (zero dimensions).
    pub fn scalar() -> Self {
        Self(Vec::new())
    }

    /// Returns the dimension sizes.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Returns the amount of elements a tensor of this shape holds.
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    /// Resolves a reshape request against an element count.
    ///
    /// # Arguments
    /// * `dims` - The requested dimensions, at most one of them `Dim::Infer`.
    /// * `numel` - The element count the resolved shape must hold.
    ///
    /// # Returns
    /// The concrete shape, or an error if the request is ambiguous or incompatible.
    pub fn infer(dims: &[Dim], numel: usize) -> Result<Self> {
        let unknown = dims.iter().filter(|d| matches!(d, Dim::Infer)).count();
        let known: usize = dims
            .iter()
            .map(|d| match d {
                Dim::Fixed(n) => *n,
                Dim::Infer => 1,
            })
            .product();

        let request = || DimList(dims.to_vec()).to_string();

        let resolved = match unknown {
            0 => dims
                .iter()
                .map(|d| match d {
                    Dim::Fixed(n) => *n,
                    Dim::Infer => 1,
                })
                .collect::<Vec<_>>(),
            1 => {
                if known == 0 || numel % known != 0 {
                    return Err(TensorErr::Inference {
                        request: request(),
                        numel,
                    });
                }

                dims.iter()
                    .map(|d| match d {
                        Dim::Fixed(n) => *n,
                        Dim::Infer => numel / known,
                    })
                    .collect()
            }
            _ => {
                return Err(TensorErr::Inference {
                    request: request(),
                    numel,
                });
            }
        };

        let shape = Self(resolved);
        if shape.numel() != numel {
            return Err(TensorErr::Inference {
                request: request(),
                numel,
            });
        }

        Ok(shape)
    }
}

impl From<&[usize]> for Shape {
    fn from(value: &[usize]) -> Self {
        Self(value.to_vec())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        write!(f, "Shape({})", dims.join(", "))
    }
}

struct DimList(Vec<Dim>);

impl fmt::Display for DimList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self
            .0
            .iter()
            .map(|d| match d {
                Dim::Fixed(n) => n.to_string(),
                Dim::Infer => "_".to_string(),
            })
            .collect();
        write!(f, "({})", dims.join(", "))
    }
}
