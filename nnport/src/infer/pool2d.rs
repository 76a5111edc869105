use anyhow::{anyhow, Result};

use crate::graph::{AutoPad, OperationKind, Pool2dParams};
use crate::types::{OperandType, UNKNOWN_DIM};

use super::dynamic::map_shapes;
use super::passthrough::copy_type_except_quant;

/// Resolve the leading and trailing pads of one spatial axis for `auto_pad`.
///
/// Explicit pads are returned unchanged, as are pads for an unknown input.
pub fn update_pool_pads(
    input: i32,
    kernel: i32,
    stride: i32,
    auto_pad: AutoPad,
    pads: [i32; 2],
) -> Result<[i32; 2]> {
    if stride <= 0 || kernel <= 0 {
        return Err(anyhow!(
            "pool2d kernel {} and stride {} must be positive",
            kernel,
            stride
        ));
    }
    match auto_pad {
        AutoPad::Explicit => Ok(pads),
        AutoPad::Valid => Ok([0, 0]),
        AutoPad::Same if input == UNKNOWN_DIM => Ok(pads),
        AutoPad::Same => {
            let output = (input + stride - 1) / stride;
            let total = ((output - 1) * stride + kernel - input).max(0);
            let leading = total / 2;
            Ok([leading, total - leading])
        }
    }
}

/// Output extent of one spatial axis.
pub fn pool_output_size(
    input: i32,
    kernel: i32,
    auto_pad: AutoPad,
    pad0: i32,
    pad1: i32,
    stride: i32,
    ceil_mode: bool,
) -> Result<i32> {
    if stride <= 0 || kernel <= 0 {
        return Err(anyhow!(
            "pool2d kernel {} and stride {} must be positive",
            kernel,
            stride
        ));
    }
    if input == UNKNOWN_DIM {
        return Ok(UNKNOWN_DIM);
    }
    let [pad0, pad1] = update_pool_pads(input, kernel, stride, auto_pad, [pad0, pad1])?;
    let span = input - kernel + pad0 + pad1;
    let output = if ceil_mode {
        (span + stride - 1) / stride + 1
    } else {
        span / stride + 1
    };
    if output <= 0 {
        return Err(anyhow!(
            "pool2d window {} does not fit input {} with pads ({}, {})",
            kernel,
            input,
            pad0,
            pad1
        ));
    }
    Ok(output)
}

fn pool_shape(shape: &[i32], params: &Pool2dParams, spatial: [usize; 2]) -> Result<Vec<i32>> {
    if shape.len() != 4 {
        return Err(anyhow!("pool2d expects a rank 4 input, got {:?}", shape));
    }
    let mut out = shape.to_vec();
    for (slot, axis) in spatial.iter().enumerate() {
        out[*axis] = if params.global_pooling {
            1
        } else {
            pool_output_size(
                shape[*axis],
                params.kernel[slot],
                params.auto_pad,
                params.pads[slot * 2],
                params.pads[slot * 2 + 1],
                params.strides[slot],
                params.ceil_mode,
            )?
        };
    }
    Ok(out)
}

pub(crate) fn infer_pool2d(
    kind: &OperationKind,
    inputs: &[OperandType],
    outputs: &mut [OperandType],
) -> Result<()> {
    let OperationKind::Pool2d(params) = kind else {
        return Err(anyhow!("pool2d inference called for {}", kind.tag()));
    };
    if inputs.len() != 1 || outputs.len() != 1 {
        return Err(anyhow!(
            "pool2d expects 1 input and 1 output, got {} and {}",
            inputs.len(),
            outputs.len()
        ));
    }
    let input = &inputs[0];
    let spatial = input.layout.spatial_axes();
    let dims = map_shapes(&[input], |shapes| pool_shape(shapes[0], params, spatial))?;
    let output = &mut outputs[0];
    copy_type_except_quant(input, output);
    output.dimensions = dims;
    Ok(())
}
