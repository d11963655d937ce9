use fed_core::{DType, Tensor};
use ndarray::{Array2, ArrayView2, Ix1, Ix2, linalg};
use rand::Rng;

use crate::{MlErr, Result, Variable, arch::ActFn};

/// A fully connected layer, `act_fn(x · kernel + bias)`.
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    kernel: Variable,
    bias: Variable,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// The kernel is drawn from a Glorot uniform distribution, the bias starts at zero.
    ///
    /// # Arguments
    /// * `name` - Prefix for the variable names.
    /// * `dim` - The `(input, output)` dimensions.
    /// * `act_fn` - An optional activation function.
    /// * `rng` - The random number generator used to initialize the kernel.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new<R: Rng>(
        name: &str,
        dim: (usize, usize),
        act_fn: Option<ActFn>,
        rng: &mut R,
    ) -> Self {
        let limit = (6.0 / (dim.0 + dim.1).max(1) as f32).sqrt();
        let kernel = Array2::from_shape_fn(dim, |_| rng.random_range(-limit..=limit));

        Self {
            dim,
            act_fn,
            kernel: Variable::new(format!("{name}/kernel"), Tensor::from(kernel.into_dyn())),
            bias: Variable::zeros(format!("{name}/bias"), DType::F32, &[dim.1]),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn trainable_variables(&self) -> Vec<Variable> {
        vec![self.kernel.clone(), self.bias.clone()]
    }

    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        self.kernel.read_f32(|w| {
            let w = w.into_dimensionality::<Ix2>().map_err(|_| MlErr::TypeMismatch {
                what: "dense kernel",
                expected: "a matrix",
            })?;

            linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut z);
            Ok::<_, MlErr>(())
        })??;

        self.bias.read_f32(|b| {
            let b = b.into_dimensionality::<Ix1>().map_err(|_| MlErr::TypeMismatch {
                what: "dense bias",
                expected: "a vector",
            })?;

            z += &b;
            Ok::<_, MlErr>(())
        })??;

        if let Some(act_fn) = &self.act_fn {
            z.mapv_inplace(|v| act_fn.f(v));
        }

        Ok(z)
    }
}
