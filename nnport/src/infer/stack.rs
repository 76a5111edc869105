use anyhow::{anyhow, Result};

use crate::graph::OperationKind;
use crate::types::{OperandType, UNKNOWN_DIM};

use super::dynamic::map_shapes;
use super::passthrough::copy_type_except_quant;

/// Resolve a possibly negative `axis` against `rank`.
pub fn normalize_axis(axis: i32, rank: usize) -> Result<usize> {
    let rank = rank as i32;
    let resolved = if axis < 0 { axis + rank } else { axis };
    if resolved < 0 || resolved >= rank {
        return Err(anyhow!("axis {} out of range for rank {}", axis, rank));
    }
    Ok(resolved as usize)
}

fn stack_shape(shapes: &[&[i32]], axis: usize) -> Result<Vec<i32>> {
    let first = shapes[0];
    let mut merged = first.to_vec();
    for shape in &shapes[1..] {
        for (idx, dim) in shape.iter().enumerate() {
            if merged[idx] == UNKNOWN_DIM || *dim == UNKNOWN_DIM {
                merged[idx] = UNKNOWN_DIM;
            } else if merged[idx] != *dim {
                return Err(anyhow!(
                    "stack inputs disagree on axis {}: {} vs {}",
                    idx,
                    merged[idx],
                    dim
                ));
            }
        }
    }
    merged.insert(axis, shapes.len() as i32);
    Ok(merged)
}

pub(crate) fn infer_stack(
    kind: &OperationKind,
    inputs: &[OperandType],
    outputs: &mut [OperandType],
) -> Result<()> {
    let OperationKind::Stack { axis } = kind else {
        return Err(anyhow!("stack inference called for {}", kind.tag()));
    };
    if inputs.is_empty() || outputs.len() != 1 {
        return Err(anyhow!(
            "stack expects at least 1 input and 1 output, got {} and {}",
            inputs.len(),
            outputs.len()
        ));
    }
    let first = &inputs[0];
    for (idx, input) in inputs.iter().enumerate().skip(1) {
        if input.rank() != first.rank() || input.precision != first.precision {
            return Err(anyhow!(
                "stack input {} is {} rank {}, expected {} rank {}",
                idx,
                input.precision,
                input.rank(),
                first.precision,
                first.rank()
            ));
        }
    }
    let axis = normalize_axis(*axis, first.rank() + 1)?;
    let refs = inputs.iter().collect::<Vec<_>>();
    let dims = map_shapes(&refs, |shapes| stack_shape(shapes, axis))?;
    let output = &mut outputs[0];
    copy_type_except_quant(first, output);
    output.dimensions = dims;
    Ok(())
}
