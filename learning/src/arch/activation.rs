use std::f32;

/// Element-wise activation applied after a layer's affine transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActFn {
    Sigmoid { amp: f32 },
    Step { top: f32, bottom: f32, tresh: f32 },
    Relu,
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid { amp }
    }

    pub fn step(top: f32, bottom: f32, tresh: f32) -> Self {
        Self::Step { top, bottom, tresh }
    }

    pub fn f(&self, z: f32) -> f32 {
        match *self {
            ActFn::Sigmoid { amp } => amp / (1. + (-z).exp()),
            ActFn::Step { top, bottom, tresh } => {
                let s = 1. / (1. + f32::consts::E.powf(-z));
                if s >= tresh { top } else { bottom }
            }
            ActFn::Relu => z.max(0.),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_centered() {
        assert_eq!(ActFn::sigmoid(2.).f(0.), 1.);
    }

    #[test]
    fn step_thresholds_the_sigmoid() {
        let step = ActFn::step(1., -1., 0.5);
        assert_eq!(step.f(0.1), 1.);
        assert_eq!(step.f(-0.1), -1.);
    }

    #[test]
    fn relu_clamps_negatives() {
        assert_eq!(ActFn::Relu.f(-3.), 0.);
        assert_eq!(ActFn::Relu.f(3.), 3.);
    }
}
