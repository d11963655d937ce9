pub mod arch;
pub mod error;
pub mod federated;
pub mod graph;
mod input_spec;
pub mod metrics;
mod model;
mod model_weights;
pub mod models;
mod variable;

pub use error::{MlErr, Result};
pub use input_spec::{Batch, InputSpec, MODEL_ARG_NAME, MODEL_LABEL_NAME};
pub use model::{BatchOutput, Model};
pub use model_weights::{
    ModelOrFactory, ModelWeights, WeightValue, parameter_count_from_model, weights_type_from_model,
};
pub use variable::Variable;
