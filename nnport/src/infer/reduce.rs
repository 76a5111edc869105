use anyhow::{anyhow, Result};

use crate::graph::OperationKind;
use crate::types::OperandType;

use super::dynamic::map_shapes;
use super::passthrough::copy_type_except_quant;
use super::stack::normalize_axis;

/// Sorted, de-duplicated reduction axes. An empty list selects every axis.
pub fn reduction_axes(axes: &[i32], rank: usize) -> Result<Vec<usize>> {
    if axes.is_empty() {
        return Ok((0..rank).collect());
    }
    let mut resolved = axes
        .iter()
        .map(|axis| normalize_axis(*axis, rank))
        .collect::<Result<Vec<_>>>()?;
    resolved.sort_unstable();
    resolved.dedup();
    Ok(resolved)
}

/// Shape left after reducing `axes` of `shape`.
pub fn reduced_shape(shape: &[i32], axes: &[usize], keep_dim: bool) -> Vec<i32> {
    let mut out = Vec::with_capacity(shape.len());
    for (idx, dim) in shape.iter().enumerate() {
        if axes.contains(&idx) {
            if keep_dim {
                out.push(1);
            }
        } else {
            out.push(*dim);
        }
    }
    if out.is_empty() {
        out.push(1);
    }
    out
}

pub(crate) fn infer_reduce_min(
    kind: &OperationKind,
    inputs: &[OperandType],
    outputs: &mut [OperandType],
) -> Result<()> {
    let OperationKind::ReduceMin { axes, keep_dim } = kind else {
        return Err(anyhow!("reduce_min inference called for {}", kind.tag()));
    };
    if inputs.len() != 1 || outputs.len() != 1 {
        return Err(anyhow!(
            "reduce_min expects 1 input and 1 output, got {} and {}",
            inputs.len(),
            outputs.len()
        ));
    }
    let input = &inputs[0];
    let axes = reduction_axes(axes, input.rank())?;
    let dims = map_shapes(&[input], |shapes| {
        Ok(reduced_shape(shapes[0], &axes, *keep_dim))
    })?;
    let output = &mut outputs[0];
    copy_type_except_quant(input, output);
    output.dimensions = dims;
    output.lod_level = 0;
    Ok(())
}
