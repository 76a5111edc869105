use std::collections::BTreeSet;

use crate::error::ModelError;
use crate::types::Lifetime;

use super::model::{Model, OperandId, OperationId};

/// Check the structural invariants of `model` and return its operations in
/// dependency order. Ties are broken by insertion order.
pub(crate) fn validate_model(model: &Model) -> Result<Vec<OperationId>, ModelError> {
    if !model.is_identified() {
        return Err(ModelError::MissingIdentification);
    }
    let operand_count = model.operands().len();
    for op in model.operations() {
        for id in op.inputs.iter().chain(op.outputs.iter()) {
            if id.0 >= operand_count {
                return Err(ModelError::DanglingOperand(*id));
            }
        }
    }

    let producers = producer_table(model);
    for (idx, list) in producers.iter().enumerate() {
        if list.len() > 1 {
            return Err(ModelError::MultipleProducers {
                operand: OperandId(idx),
                count: list.len(),
            });
        }
        let operand = &model.operands()[idx];
        let bound = matches!(operand.ty.lifetime, Lifetime::ModelInput | Lifetime::Constant)
            || operand.buffer.is_some()
            || model.input_operands().contains(&OperandId(idx));
        if !list.is_empty() && bound {
            return Err(ModelError::ProducedInput(OperandId(idx)));
        }
    }

    for (idx, op) in model.operations().iter().enumerate() {
        for input in &op.inputs {
            let lifetime = model.operands()[input.0].ty.lifetime;
            let needs_producer = matches!(lifetime, Lifetime::Temporary | Lifetime::ModelOutput);
            if needs_producer && producers[input.0].is_empty() {
                return Err(ModelError::Unproduced {
                    operand: *input,
                    operation: OperationId(idx),
                });
            }
        }
    }
    for output in model.output_operands() {
        if producers[output.0].is_empty() {
            return Err(ModelError::UnproducedOutput(*output));
        }
    }

    for op in model.operations() {
        for input in &op.inputs {
            if model.operands()[input.0].ty.is_pending() {
                return Err(ModelError::Uninferred(*input));
            }
        }
    }
    for id in model.output_operands() {
        if model.operands()[id.0].ty.is_pending() {
            return Err(ModelError::Uninferred(*id));
        }
    }

    let order = dependency_order(model, &producers)?;

    for id in model
        .input_operands()
        .iter()
        .chain(model.output_operands().iter())
    {
        if let Some(axis) = model.operands()[id.0].ty.first_unresolved_axis() {
            return Err(ModelError::UnresolvedDimension { operand: *id, axis });
        }
    }
    Ok(order)
}

fn producer_table(model: &Model) -> Vec<Vec<OperationId>> {
    let mut producers: Vec<Vec<OperationId>> = vec![Vec::new(); model.operands().len()];
    for (idx, op) in model.operations().iter().enumerate() {
        for out in &op.outputs {
            if let Some(list) = producers.get_mut(out.0) {
                list.push(OperationId(idx));
            }
        }
    }
    producers
}

/// Operations of `model` in dependency order, ties broken by insertion order.
pub(crate) fn operation_order(model: &Model) -> Result<Vec<OperationId>, ModelError> {
    dependency_order(model, &producer_table(model))
}

fn dependency_order(
    model: &Model,
    producers: &[Vec<OperationId>],
) -> Result<Vec<OperationId>, ModelError> {
    let ops = model.operations();
    let mut pending = vec![0usize; ops.len()];
    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); ops.len()];
    for (idx, op) in ops.iter().enumerate() {
        for input in &op.inputs {
            if let Some(producer) = producers.get(input.0).and_then(|list| list.first()) {
                pending[idx] += 1;
                consumers[producer.0].push(idx);
            }
        }
    }

    let mut ready: BTreeSet<usize> = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(idx, _)| idx)
        .collect();
    let mut order = Vec::with_capacity(ops.len());
    while let Some(idx) = ready.pop_first() {
        order.push(OperationId(idx));
        for consumer in &consumers[idx] {
            pending[*consumer] -= 1;
            if pending[*consumer] == 0 {
                ready.insert(*consumer);
            }
        }
    }

    if order.len() != ops.len() {
        let stuck = pending
            .iter()
            .position(|count| *count > 0)
            .unwrap_or_default();
        return Err(ModelError::Cycle(OperationId(stuck)));
    }
    Ok(order)
}
