use anyhow::{anyhow, Result};

use crate::graph::OperationKind;
use crate::types::OperandType;

/// Copy everything but the quantization params from `input` into `output`.
pub fn copy_type_except_quant(input: &OperandType, output: &mut OperandType) {
    output.precision = input.precision;
    output.layout = input.layout;
    output.lod_level = input.lod_level;
    output.dimensions = input.dimensions.clone();
}

pub(crate) fn infer_prelu(
    _kind: &OperationKind,
    inputs: &[OperandType],
    outputs: &mut [OperandType],
) -> Result<()> {
    if inputs.len() != 2 || outputs.len() != 1 {
        return Err(anyhow!(
            "prelu expects 2 inputs and 1 output, got {} and {}",
            inputs.len(),
            outputs.len()
        ));
    }
    copy_type_except_quant(&inputs[0], &mut outputs[0]);
    Ok(())
}
