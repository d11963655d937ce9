//! Structural analysis over distributed types.

use serde::{Deserialize, Serialize};

use crate::{TensorType, Type};

/// Tensor and scalar parameter counts of a type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorCount {
    /// Tensors accepted by the filter.
    pub num_tensors: usize,
    /// Scalars across the accepted tensors with a fully defined shape.
    pub parameters: usize,
    /// Accepted tensors whose shape is not fully defined.
    pub num_unspecified_tensors: usize,
}

/// Counts the tensors and scalar parameters found in `ty`.
///
/// Federated types are looked through to their member type.
///
/// # Arguments
/// * `ty` - The type to walk.
/// * `filter` - Optional predicate selecting which tensors are counted.
///
/// # Returns
/// The resulting `TensorCount`.
pub fn count_tensors_in_type(
    ty: &Type,
    filter: Option<&dyn Fn(&TensorType) -> bool>,
) -> TensorCount {
    let mut count = TensorCount::default();
    visit(ty, filter, &mut count);
    count
}

fn visit(ty: &Type, filter: Option<&dyn Fn(&TensorType) -> bool>, count: &mut TensorCount) {
    match ty {
        Type::Tensor(t) => {
            if filter.is_some_and(|f| !f(t)) {
                return;
            }

            count.num_tensors += 1;
            match t.shape.num_elements() {
                Some(n) => count.parameters += n,
                None => count.num_unspecified_tensors += 1,
            }
        }
        Type::Struct(s) => s.values().for_each(|member| visit(member, filter, count)),
        Type::Federated { member, .. } => visit(member, filter, count),
    }
}
