use anyhow::{anyhow, Result};

use crate::graph::OperationKind;
use crate::types::{Dimensions, OperandType, UNKNOWN_DIM};

use super::dynamic::map_shapes;

/// Offset levels carried by the interaction output.
pub const MATCH_MATRIX_LOD_LEVEL: u32 = 3;

fn known_or(a: i32, b: i32) -> i32 {
    if a == UNKNOWN_DIM {
        b
    } else {
        a
    }
}

fn check_agree(what: &str, a: i32, b: i32) -> Result<()> {
    if a != UNKNOWN_DIM && b != UNKNOWN_DIM && a != b {
        return Err(anyhow!("match_matrix_tensor {} mismatch: {} vs {}", what, a, b));
    }
    Ok(())
}

fn tmp_shape(shapes: &[&[i32]], dim_t: i32) -> Result<Vec<i32>> {
    let (x, y, w) = (shapes[0], shapes[1], shapes[2]);
    if x.len() != 2 || y.len() != 2 || w.len() != 3 {
        return Err(anyhow!(
            "match_matrix_tensor expects x [L, D], y [L, D] and w [D, T, D], got {:?}, {:?}, {:?}",
            x,
            y,
            w
        ));
    }
    check_agree("x/y feature width", x[1], y[1])?;
    check_agree("x/w feature width", x[1], w[0])?;
    check_agree("y/w feature width", y[1], w[2])?;
    check_agree("w channel count", w[1], dim_t)?;
    let dim_in = known_or(known_or(x[1], y[1]), known_or(w[0], w[2]));
    let width = if dim_in == UNKNOWN_DIM {
        UNKNOWN_DIM
    } else {
        dim_t * dim_in
    };
    Ok(vec![x[0], width])
}

pub(crate) fn infer_match_matrix(
    kind: &OperationKind,
    inputs: &[OperandType],
    outputs: &mut [OperandType],
) -> Result<()> {
    let OperationKind::MatchMatrixTensor(params) = kind else {
        return Err(anyhow!(
            "match_matrix_tensor inference called for {}",
            kind.tag()
        ));
    };
    if inputs.len() != 3 || outputs.len() != 2 {
        return Err(anyhow!(
            "match_matrix_tensor expects 3 inputs and 2 outputs, got {} and {}",
            inputs.len(),
            outputs.len()
        ));
    }
    if params.dim_t <= 0 {
        return Err(anyhow!(
            "match_matrix_tensor dim_t must be positive, got {}",
            params.dim_t
        ));
    }
    let (x, y, w) = (&inputs[0], &inputs[1], &inputs[2]);
    let tmp_dims = map_shapes(&[x, y, w], |shapes| tmp_shape(shapes, params.dim_t))?;

    // The leading extent of `out` only exists once the offsets are known.
    let out = &mut outputs[0];
    out.precision = x.precision;
    out.layout = x.layout;
    out.dimensions = Dimensions::new(vec![UNKNOWN_DIM, 1]);
    out.lod_level = MATCH_MATRIX_LOD_LEVEL;

    let tmp = &mut outputs[1];
    tmp.precision = x.precision;
    tmp.layout = x.layout;
    tmp.dimensions = tmp_dims;
    tmp.lod_level = 0;
    Ok(())
}
