use ndarray::ArrayView2;

use super::LossFn;

/// Mean squared error loss function.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mse;

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        (&y_pred - &y)
            .mapv(|x| x.powi(2))
            .mean()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn mean_of_squares() {
        let y_pred = array![[1.0f32], [3.0]];
        let y = array![[0.0f32], [0.0]];
        assert_eq!(Mse.loss(y_pred.view(), y.view()), 5.0);
    }

    #[test]
    fn empty_batch_has_zero_loss() {
        let empty = ndarray::Array2::<f32>::zeros((0, 1));
        assert_eq!(Mse.loss(empty.view(), empty.view()), 0.0);
    }
}
