//! Shape and type inference.
//!
//! Each operation kind maps to one rule. A rule receives copies of the input
//! types and the current output types and rewrites the outputs in place; the
//! results are then written back into the model.
mod dynamic;
mod match_matrix;
mod passthrough;
mod pool2d;
mod reduce;
mod stack;

use anyhow::{Context, Result};

use crate::error::ModelError;
use crate::logging::OpScope;
use crate::graph::{
    describe_operation, operand_to_string, operation_order, Model, OpTag, OperationId,
    OperationKind,
};
use crate::types::{Lifetime, OperandType};

pub use match_matrix::MATCH_MATRIX_LOD_LEVEL;
pub use passthrough::copy_type_except_quant;
pub use pool2d::{pool_output_size, update_pool_pads};
pub use reduce::{reduced_shape, reduction_axes};
pub use stack::normalize_axis;

pub type InferFn = fn(&OperationKind, &[OperandType], &mut [OperandType]) -> Result<()>;

pub fn infer_fn(tag: OpTag) -> InferFn {
    match tag {
        OpTag::PRelu => passthrough::infer_prelu,
        OpTag::Pool2d => pool2d::infer_pool2d,
        OpTag::Stack => stack::infer_stack,
        OpTag::ReduceMin => reduce::infer_reduce_min,
        OpTag::MatchMatrixTensor => match_matrix::infer_match_matrix,
    }
}

/// Infer and write back the output types of one operation.
pub fn infer_operation(model: &mut Model, op_id: OperationId) -> Result<()> {
    let op = model.operation(op_id)?.clone();
    let _scope = OpScope::enter(op_id.0, op.kind.tag().as_str(), None);
    let inputs = op
        .inputs
        .iter()
        .map(|id| {
            let ty = model.operand_type(*id)?;
            if ty.is_pending() {
                return Err(ModelError::Uninferred(*id));
            }
            Ok(ty.clone())
        })
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("cannot infer {}", describe_operation(&op)))?;
    let mut outputs = op
        .outputs
        .iter()
        .map(|id| model.operand_type(*id).cloned())
        .collect::<Result<Vec<_>, _>>()?;

    infer_fn(op.kind.tag())(&op.kind, &inputs, &mut outputs)
        .with_context(|| format!("failed to infer {}", describe_operation(&op)))?;

    for (id, mut ty) in op.outputs.iter().zip(outputs) {
        let slot = model.operand_type_mut(*id)?;
        // Boundary and constant tags are kept; `finish` rejects producers of them.
        ty.lifetime = match slot.lifetime {
            Lifetime::ModelInput | Lifetime::ModelOutput | Lifetime::Constant => slot.lifetime,
            Lifetime::Temporary => Lifetime::Temporary,
        };
        crate::trace!("output #{}: {}", id, operand_to_string(&ty));
        *slot = ty;
    }
    Ok(())
}

/// Run inference over every operation, producers before consumers.
pub fn infer_model(model: &mut Model) -> Result<()> {
    for op_id in operation_order(model)? {
        infer_operation(model, op_id)?;
    }
    Ok(())
}
