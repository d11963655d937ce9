use fed_core::{Struct, Tensor, TensorCount, TensorType, Type, Value, count_tensors_in_type};
use log::{debug, warn};

use crate::{Model, MlErr, Result, Variable, graph::GraphScope};

const TRAINABLE: &str = "trainable";
const NON_TRAINABLE: &str = "non_trainable";

/// Anything that can stand for the value of a model weight.
pub trait WeightValue {
    fn tensor_type(&self) -> TensorType;

    /// Returns the current value.
    fn to_tensor(&self) -> Tensor;
}

impl WeightValue for Variable {
    fn tensor_type(&self) -> TensorType {
        Variable::tensor_type(self)
    }

    fn to_tensor(&self) -> Tensor {
        self.read()
    }
}

impl WeightValue for Tensor {
    fn tensor_type(&self) -> TensorType {
        Tensor::tensor_type(self)
    }

    fn to_tensor(&self) -> Tensor {
        self.clone()
    }
}

/// The trainable and non-trainable weights of a model, local variables excluded.
///
/// `ModelWeights<Variable>` aliases a live model's variables, `ModelWeights<Tensor>` holds
/// plain values such as the result of an aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelWeights<T = Variable> {
    trainable: Vec<T>,
    non_trainable: Vec<T>,
}

impl<T> ModelWeights<T> {
    pub fn new(trainable: Vec<T>, non_trainable: Vec<T>) -> Self {
        Self {
            trainable,
            non_trainable,
        }
    }

    pub fn trainable(&self) -> &[T] {
        &self.trainable
    }

    pub fn non_trainable(&self) -> &[T] {
        &self.non_trainable
    }
}

impl ModelWeights<Variable> {
    /// Captures the current trainable and non-trainable variables of `model`.
    ///
    /// The returned weights alias the model's variables, they are not copies.
    pub fn from_model<M: Model + ?Sized>(model: &M) -> Self {
        Self::new(
            model.trainable_variables().to_vec(),
            model.non_trainable_variables().to_vec(),
        )
    }

    /// Reads every aliased variable into a detached copy.
    pub fn snapshot(&self) -> ModelWeights<Tensor> {
        ModelWeights::new(
            self.trainable.iter().map(Variable::read).collect(),
            self.non_trainable.iter().map(Variable::read).collect(),
        )
    }
}

impl ModelWeights<Tensor> {
    /// Rebuilds weights from a computed `<trainable=<...>,non_trainable=<...>>` structure.
    ///
    /// # Errors
    /// Returns `MlErr::TypeMismatch` if `value` is not a structure of tensor structures and
    /// `MlErr::MissingField` if one of both fields is absent.
    pub fn from_tff_result(value: &Value) -> Result<Self> {
        let s = value.as_struct().ok_or(MlErr::TypeMismatch {
            what: "model weights",
            expected: "a structure with `trainable` and `non_trainable` fields",
        })?;

        let field = |name: &'static str| -> Result<Vec<Tensor>> {
            let inner = s
                .get(name)
                .ok_or_else(|| MlErr::MissingField {
                    name: name.to_string(),
                })?
                .as_struct()
                .ok_or(MlErr::TypeMismatch {
                    what: name,
                    expected: "a structure of tensors",
                })?;

            inner
                .values()
                .map(|v| {
                    v.as_tensor().cloned().ok_or(MlErr::TypeMismatch {
                        what: name,
                        expected: "a structure of tensors",
                    })
                })
                .collect()
        };

        Ok(Self::new(field(TRAINABLE)?, field(NON_TRAINABLE)?))
    }
}

impl<T: WeightValue> ModelWeights<T> {
    /// Copies these weights into `model`'s trainable and non-trainable variables by position.
    ///
    /// Both collections are checked for count, dtype and shape before anything is written,
    /// on mismatch the model is left untouched.
    ///
    /// # Errors
    /// Returns `MlErr::SizeMismatch` or `MlErr::WeightsStructureMismatch` on a structural
    /// mismatch.
    pub fn assign_weights_to<M: Model + ?Sized>(&self, model: &M) -> Result<()> {
        let trainable = model.trainable_variables();
        let non_trainable = model.non_trainable_variables();

        check_structure(TRAINABLE, &self.trainable, trainable)?;
        check_structure(NON_TRAINABLE, &self.non_trainable, non_trainable)?;

        for (var, w) in trainable.iter().zip(&self.trainable) {
            var.assign(&w.to_tensor())?;
        }

        for (var, w) in non_trainable.iter().zip(&self.non_trainable) {
            var.assign(&w.to_tensor())?;
        }

        debug!(
            trainable = self.trainable.len(),
            non_trainable = self.non_trainable.len();
            "assigned model weights"
        );
        Ok(())
    }

    /// Returns the `<trainable=<...>,non_trainable=<...>>` type of these weights.
    pub fn type_signature(&self) -> Type {
        let types = |ws: &[T]| {
            Type::Struct(Struct::unnamed(
                ws.iter().map(|w| Type::Tensor(w.tensor_type())),
            ))
        };

        Type::Struct(Struct::named([
            (TRAINABLE, types(&self.trainable)),
            (NON_TRAINABLE, types(&self.non_trainable)),
        ]))
    }

    /// Returns these weights as the two field structure `from_tff_result` consumes.
    pub fn to_value(&self) -> Value {
        let values = |ws: &[T]| Value::unnamed(ws.iter().map(|w| Value::Tensor(w.to_tensor())));

        Value::named([
            (TRAINABLE, values(&self.trainable)),
            (NON_TRAINABLE, values(&self.non_trainable)),
        ])
    }
}

fn check_structure<T: WeightValue>(
    what: &'static str,
    weights: &[T],
    vars: &[Variable],
) -> Result<()> {
    if weights.len() != vars.len() {
        warn!(
            "{what} weights have {} tensors, the model has {}",
            weights.len(),
            vars.len()
        );
        return Err(MlErr::SizeMismatch {
            what,
            got: weights.len(),
            expected: vars.len(),
        });
    }

    for (idx, (w, var)) in weights.iter().zip(vars).enumerate() {
        let got = w.tensor_type();
        let expected = var.tensor_type();

        if got != expected {
            warn!("{what} weight {idx} is {got}, the model expects {expected}");
            return Err(MlErr::WeightsStructureMismatch {
                what,
                idx,
                got,
                expected,
            });
        }
    }

    Ok(())
}

/// Either a built model or a function building one.
pub enum ModelOrFactory<'a, M> {
    Model(&'a M),
    Factory(Box<dyn FnOnce() -> Result<M> + 'a>),
}

impl<'a, M> ModelOrFactory<'a, M> {
    /// Wraps a zero argument model constructor.
    pub fn factory<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<M> + 'a,
    {
        Self::Factory(Box::new(f))
    }
}

impl<'a, M> From<&'a M> for ModelOrFactory<'a, M> {
    fn from(value: &'a M) -> Self {
        Self::Model(value)
    }
}

/// Returns the type of `ModelWeights::from_model` for a model.
///
/// A factory is invoked inside a disposable `GraphScope`, the variables it creates are
/// discarded with the model and never reach the thread's default graph, also when the
/// factory fails.
///
/// # Arguments
/// * `model` - A model or a factory building one.
///
/// # Returns
/// A struct type with the `trainable` and `non_trainable` fields.
pub fn weights_type_from_model<'a, M>(model: impl Into<ModelOrFactory<'a, M>>) -> Result<Type>
where
    M: Model + 'a,
{
    match model.into() {
        ModelOrFactory::Model(model) => Ok(ModelWeights::from_model(model).type_signature()),
        ModelOrFactory::Factory(factory) => {
            let _scope = GraphScope::enter();
            let model = factory()?;
            Ok(ModelWeights::from_model(&model).type_signature())
        }
    }
}

/// Counts the trainable tensors and scalar parameters of a model.
///
/// # Arguments
/// * `model` - A model or a factory building one.
///
/// # Returns
/// The `TensorCount` of the `trainable` part of the model's weights type.
pub fn parameter_count_from_model<'a, M>(
    model: impl Into<ModelOrFactory<'a, M>>,
) -> Result<TensorCount>
where
    M: Model + 'a,
{
    let weights_type = weights_type_from_model(model)?;
    let trainable = weights_type
        .field(TRAINABLE)
        .ok_or_else(|| MlErr::MissingField {
            name: TRAINABLE.to_string(),
        })?;

    Ok(count_tensors_in_type(trainable, None))
}
