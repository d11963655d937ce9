use ndarray::{Array2, ArrayView2};

use super::{Mode, layers::Layer};
use crate::{MlErr, Result, Variable};

/// A stack of layers applied one after the other.
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential` network.
    ///
    /// # Arguments
    /// * `layers` - The layers in application order.
    ///
    /// # Returns
    /// A new `Sequential` instance or an error if there are no layers or two consecutive
    /// layers disagree on their dimensions.
    pub fn new(layers: impl IntoIterator<Item = Layer>) -> Result<Self> {
        let layers: Vec<_> = layers.into_iter().collect();

        if layers.is_empty() {
            return Err(MlErr::ModelConstruction(
                "a sequential network needs at least one layer".to_string(),
            ));
        }

        for (i, pair) in layers.windows(2).enumerate() {
            let (out, inp) = (pair[0].output_dim(), pair[1].input_dim());
            if out != inp {
                return Err(MlErr::ModelConstruction(format!(
                    "layer {i} outputs {out} features but layer {} expects {inp}",
                    i + 1
                )));
            }
        }

        Ok(Self { layers })
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map(Layer::input_dim).unwrap_or_default()
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map(Layer::output_dim).unwrap_or_default()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Runs every layer over `x`.
    ///
    /// # Errors
    /// Returns `MlErr` if `x` does not have `input_dim` columns.
    pub fn forward(&self, x: ArrayView2<f32>, mode: Mode) -> Result<Array2<f32>> {
        let mut layers = self.layers.iter();
        let Some(first) = layers.next() else {
            return Ok(x.to_owned());
        };

        let mut y = first.forward(x, mode)?;
        for layer in layers {
            y = layer.forward(y.view(), mode)?;
        }

        Ok(y)
    }

    pub fn trainable_variables(&self) -> Vec<Variable> {
        self.layers
            .iter()
            .flat_map(Layer::trainable_variables)
            .collect()
    }

    pub fn non_trainable_variables(&self) -> Vec<Variable> {
        self.layers
            .iter()
            .flat_map(Layer::non_trainable_variables)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::arch::ActFn;

    #[test]
    fn rejects_mismatched_layers() {
        let mut rng = rand::rng();
        let err = Sequential::new([
            Layer::dense("l0", (2, 3), None, &mut rng),
            Layer::dense("l1", (2, 1), None, &mut rng),
        ])
        .err()
        .unwrap();

        assert!(matches!(err, MlErr::ModelConstruction(_)));
        assert!(matches!(
            Sequential::new(Vec::new()),
            Err(MlErr::ModelConstruction(_))
        ));
    }

    #[test]
    fn forward_chains_layers() {
        let mut rng = rand::rng();
        let net = Sequential::new([
            Layer::normalization("norm", 2),
            Layer::dense("l0", (2, 4), Some(ActFn::sigmoid(1.)), &mut rng),
            Layer::dense("l1", (4, 1), None, &mut rng),
        ])
        .unwrap();

        let x = array![[1.0f32, 2.0], [0.5, 0.5], [0.0, 0.0]];
        let y = net.forward(x.view(), Mode::Inference).unwrap();
        assert_eq!(y.dim(), (3, 1));
        assert_eq!((net.input_dim(), net.output_dim()), (2, 1));
        assert_eq!(net.trainable_variables().len(), 6);
        assert_eq!(net.non_trainable_variables().len(), 2);
    }
}
