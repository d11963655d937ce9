use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Dense, Normalization};
use crate::{
    Result, Variable,
    arch::{ActFn, Mode},
};

pub enum Layer {
    Dense(Dense),
    Normalization(Normalization),
}

impl Layer {
    pub fn dense<R: Rng>(
        name: &str,
        dim: (usize, usize),
        act_fn: Option<ActFn>,
        rng: &mut R,
    ) -> Self {
        Self::Dense(Dense::new(name, dim, act_fn, rng))
    }

    pub fn normalization(name: &str, dim: usize) -> Self {
        Self::Normalization(Normalization::new(name, dim))
    }

    pub fn input_dim(&self) -> usize {
        match self {
            Self::Dense(l) => l.dim().0,
            Self::Normalization(l) => l.dim(),
        }
    }

    pub fn output_dim(&self) -> usize {
        match self {
            Self::Dense(l) => l.dim().1,
            Self::Normalization(l) => l.dim(),
        }
    }

    pub fn forward(&self, x: ArrayView2<f32>, mode: Mode) -> Result<Array2<f32>> {
        match self {
            Self::Dense(l) => l.forward(x),
            Self::Normalization(l) => l.forward(x, mode),
        }
    }

    pub fn trainable_variables(&self) -> Vec<Variable> {
        match self {
            Self::Dense(l) => l.trainable_variables(),
            Self::Normalization(l) => l.trainable_variables(),
        }
    }

    pub fn non_trainable_variables(&self) -> Vec<Variable> {
        match self {
            Self::Dense(_) => Vec::new(),
            Self::Normalization(l) => l.non_trainable_variables(),
        }
    }
}
