use fed_core::{DType, Tensor};
use ndarray::{Array1, Array2, ArrayView2, Axis, Ix1};

use crate::{MlErr, Result, Variable, arch::Mode};

const EPSILON: f32 = 1e-3;
const MOMENTUM: f32 = 0.99;

/// Feature-wise batch normalization.
///
/// `gamma` and `beta` are learned, the moving statistics are non-trainable weights updated
/// by `Mode::Training` passes and used by `Mode::Inference` ones.
pub struct Normalization {
    dim: usize,
    gamma: Variable,
    beta: Variable,
    moving_mean: Variable,
    moving_variance: Variable,
}

impl Normalization {
    pub fn new(name: &str, dim: usize) -> Self {
        Self {
            dim,
            gamma: Variable::new(
                format!("{name}/gamma"),
                Tensor::from(Array1::<f32>::ones(dim).into_dyn()),
            ),
            beta: Variable::zeros(format!("{name}/beta"), DType::F32, &[dim]),
            moving_mean: Variable::zeros(format!("{name}/moving_mean"), DType::F32, &[dim]),
            moving_variance: Variable::new(
                format!("{name}/moving_variance"),
                Tensor::from(Array1::<f32>::ones(dim).into_dyn()),
            ),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn trainable_variables(&self) -> Vec<Variable> {
        vec![self.gamma.clone(), self.beta.clone()]
    }

    pub fn non_trainable_variables(&self) -> Vec<Variable> {
        vec![self.moving_mean.clone(), self.moving_variance.clone()]
    }

    pub fn forward(&self, x: ArrayView2<f32>, mode: Mode) -> Result<Array2<f32>> {
        if x.ncols() != self.dim {
            return Err(MlErr::SizeMismatch {
                what: "normalization input",
                got: x.ncols(),
                expected: self.dim,
            });
        }

        let (mean, variance) = if mode.uses_batch_stats() && x.nrows() > 0 {
            let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(self.dim));
            let variance = x.var_axis(Axis(0), 0.0);
            if mode == Mode::Training {
                update_moving(&self.moving_mean, &mean)?;
                update_moving(&self.moving_variance, &variance)?;
            }
            (mean, variance)
        } else {
            (vector(&self.moving_mean)?, vector(&self.moving_variance)?)
        };

        let gamma = vector(&self.gamma)?;
        let beta = vector(&self.beta)?;

        let scale = &gamma / &variance.mapv(|v| (v + EPSILON).sqrt());
        let shift = &beta - &(&mean * &scale);

        Ok(&(&x * &scale) + &shift)
    }

}

fn update_moving(var: &Variable, batch: &Array1<f32>) -> Result<()> {
    var.update_f32(|mut moving| {
        moving.zip_mut_with(batch, |m, &b| *m = *m * MOMENTUM + b * (1. - MOMENTUM));
    })
}

fn vector(var: &Variable) -> Result<Array1<f32>> {
    var.read_f32(|v| v.into_dimensionality::<Ix1>().map(|v| v.to_owned()))?
        .map_err(|_| MlErr::TypeMismatch {
            what: "normalization weight",
            expected: "a vector",
        })
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn inference_uses_moving_statistics() {
        let norm = Normalization::new("norm", 2);
        let x = array![[1.0f32, 2.0], [3.0, 4.0]];

        let y = norm.forward(x.view(), Mode::Inference).unwrap();
        let expected = x.mapv(|v| v / (1.0f32 + EPSILON).sqrt());
        assert!(y.iter().zip(&expected).all(|(a, b)| (a - b).abs() < 1e-6));
        assert_eq!(vector(&norm.moving_mean).unwrap(), array![0.0f32, 0.0]);
    }

    #[test]
    fn training_updates_moving_statistics() {
        let norm = Normalization::new("norm", 1);
        let x = array![[1.0f32], [3.0]];

        let y = norm.forward(x.view(), Mode::Training).unwrap();
        assert!(y[[0, 0]] < 0.0 && y[[1, 0]] > 0.0);

        let mean = vector(&norm.moving_mean).unwrap();
        assert!((mean[0] - 2.0 * (1.0 - MOMENTUM)).abs() < 1e-6);
    }

    #[test]
    fn frozen_pass_uses_batch_statistics_without_storing_them() {
        let norm = Normalization::new("norm", 1);
        let x = array![[1.0f32], [3.0]];

        let frozen = norm.forward(x.view(), Mode::Frozen).unwrap();
        assert_eq!(vector(&norm.moving_mean).unwrap(), array![0.0f32]);
        assert_eq!(vector(&norm.moving_variance).unwrap(), array![1.0f32]);

        let trained = norm.forward(x.view(), Mode::Training).unwrap();
        assert_eq!(frozen, trained);
    }

    #[test]
    fn weights_are_split() {
        let norm = Normalization::new("norm", 3);
        assert_eq!(norm.trainable_variables().len(), 2);
        assert_eq!(norm.non_trainable_variables()[0].name(), "norm/moving_mean");
    }
}
