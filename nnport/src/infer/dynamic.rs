use anyhow::{anyhow, Result};

use crate::types::{Dimensions, OperandType};

/// Number of dynamic-shape alternatives shared by `inputs`.
///
/// Inputs without alternatives are ignored. Every other input must carry the
/// same count.
pub(crate) fn alternative_count(inputs: &[&OperandType]) -> Result<usize> {
    let mut count = 0usize;
    for (idx, ty) in inputs.iter().enumerate() {
        let current = ty.dimensions.dynamic_count();
        if current == 0 {
            continue;
        }
        if count != 0 && current != count {
            return Err(anyhow!(
                "input {} carries {} dynamic shapes, expected {}",
                idx,
                current,
                count
            ));
        }
        count = current;
    }
    Ok(count)
}

/// Shape of `ty` for alternative `index`, or its static shape when it has none.
pub(crate) fn shape_for(ty: &OperandType, index: usize) -> &[i32] {
    ty.dimensions
        .dynamic
        .get(index)
        .map(Vec::as_slice)
        .unwrap_or(ty.dimensions.data.as_slice())
}

/// Apply `rule` to the static shapes of `inputs` and then to each alternative
/// in turn. Alternative `k` of the result only sees alternative `k` of the
/// inputs.
pub(crate) fn map_shapes<F>(inputs: &[&OperandType], mut rule: F) -> Result<Dimensions>
where
    F: FnMut(&[&[i32]]) -> Result<Vec<i32>>,
{
    let count = alternative_count(inputs)?;
    let statics = inputs
        .iter()
        .map(|ty| ty.dimensions.data.as_slice())
        .collect::<Vec<_>>();
    let data = rule(&statics)?;
    let mut dynamic = Vec::with_capacity(count);
    for index in 0..count {
        let shapes = inputs
            .iter()
            .map(|ty| shape_for(ty, index))
            .collect::<Vec<_>>();
        dynamic.push(rule(&shapes)?);
    }
    Ok(Dimensions::with_dynamic(data, dynamic)?)
}
