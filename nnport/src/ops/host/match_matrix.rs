//! Host reference for the match-matrix interaction.
//!
//! For batch `b`, channel `t`, left row `i` and right row `j`:
//! `out[top[b] + t·len_l·len_r + i·len_r + j] = act(Σ_k tmp[i][t·D + k] · y[j][k])`
//! where `tmp = x · W` and `W` is viewed as `[D, T·D]`.
use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;

use crate::backend::Device;
use crate::error::DispatchError;
use crate::graph::{MatchMatrixParams, OpTag, OperationKind};
use crate::lod::{match_matrix_lod, MatchMatrixLod};
use crate::ops::math::{dot, Activation};
use crate::ops::registry::{build_entries, KernelFactory, KernelKey};
use crate::ops::{check_arity, Kernel, PrepareContext};
use crate::tensor::{encode_f32, HostTensor};
use crate::types::Precision;

use super::{require_f32, HOST_LAYOUTS};

/// Largest magnitude of 16-bit fixed-point storage.
pub const FIXED_I16_MAX: f32 = 32767.0;

pub static ENTRIES: Lazy<Vec<(KernelKey, KernelFactory)>> = Lazy::new(|| {
    build_entries(
        OpTag::MatchMatrixTensor,
        Device::Host,
        Precision::Float32,
        &HOST_LAYOUTS,
        create,
    )
});

fn create() -> Box<dyn Kernel> {
    Box::new(MatchMatrixHostKernel::default())
}

pub(crate) struct MatchMatrixProblem<'a> {
    pub x: &'a [f32],
    pub y: &'a [f32],
    /// `[dim_in, dim_t, dim_in]`
    pub weight: &'a [f32],
    pub offset_l: &'a [usize],
    pub offset_r: &'a [usize],
    pub dim_in: usize,
    pub dim_t: usize,
    pub activation: Activation,
}

pub(crate) struct MatchMatrixOutput {
    pub out: Vec<f32>,
    pub tmp: Vec<f32>,
    pub layout: MatchMatrixLod,
}

pub(crate) fn dequantize_fixed_i16(bytes: &[u8], weight_max: f32) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| bytemuck::pod_read_unaligned::<i16>(chunk) as f32 * weight_max / FIXED_I16_MAX)
        .collect()
}

pub(crate) fn activation_for(params: &MatchMatrixParams) -> Activation {
    if params.fuse_relu {
        Activation::Relu
    } else {
        Activation::Linear
    }
}

pub(crate) fn match_matrix_forward(problem: &MatchMatrixProblem<'_>) -> Result<MatchMatrixOutput> {
    let (dim_in, dim_t) = (problem.dim_in, problem.dim_t);
    let layout = match_matrix_lod(problem.offset_l, problem.offset_r, dim_t)?;
    let rows_l = problem.offset_l.last().copied().unwrap_or_default();
    let rows_r = problem.offset_r.last().copied().unwrap_or_default();
    let width = dim_t * dim_in;
    if problem.x.len() < rows_l * dim_in || problem.y.len() < rows_r * dim_in {
        return Err(anyhow!(
            "offsets address {} left and {} right rows beyond the inputs",
            rows_l,
            rows_r
        ));
    }
    if problem.weight.len() != dim_in * width {
        return Err(anyhow!(
            "weight holds {} values, expected {}",
            problem.weight.len(),
            dim_in * width
        ));
    }

    let mut tmp = vec![0.0f32; rows_l * width];
    for row in 0..rows_l {
        let acc = &mut tmp[row * width..(row + 1) * width];
        for d in 0..dim_in {
            let xv = problem.x[row * dim_in + d];
            if xv == 0.0 {
                continue;
            }
            let w_row = &problem.weight[d * width..(d + 1) * width];
            for (slot, w) in acc.iter_mut().zip(w_row) {
                *slot += xv * w;
            }
        }
    }

    let mut out = vec![0.0f32; layout.output_len()];
    let batch = problem.offset_l.len() - 1;
    for b in 0..batch {
        let (start_l, start_r) = (problem.offset_l[b], problem.offset_r[b]);
        let len_l = problem.offset_l[b + 1] - start_l;
        let len_r = problem.offset_r[b + 1] - start_r;
        let base = layout.top_offset[b];
        for t in 0..dim_t {
            for i in 0..len_l {
                let row = (start_l + i) * width + t * dim_in;
                let left = &tmp[row..row + dim_in];
                for j in 0..len_r {
                    let right = &problem.y[(start_r + j) * dim_in..(start_r + j + 1) * dim_in];
                    out[base + t * len_l * len_r + i * len_r + j] = dot(left, right);
                }
            }
        }
    }
    problem.activation.apply_slice(&mut out);
    Ok(MatchMatrixOutput { out, tmp, layout })
}

/// Level-0 offsets of both sequence inputs, checked for a shared batch size.
pub(crate) fn input_offsets<'a>(
    x: &'a HostTensor,
    y: &'a HostTensor,
) -> Result<(&'a [usize], &'a [usize]), DispatchError> {
    let (Some(left), Some(right)) = (x.lod.level(0), y.lod.level(0)) else {
        return Err(DispatchError::Precondition(
            "match_matrix_tensor needs sequence offsets on x and y".to_string(),
        ));
    };
    if left.len() != right.len() {
        return Err(DispatchError::Precondition(format!(
            "x has {} sequences but y has {}",
            left.len() - 1,
            right.len() - 1
        )));
    }
    let rows = |t: &HostTensor| t.dims.first().copied().unwrap_or_default();
    if left[left.len() - 1] != rows(x) || right[right.len() - 1] != rows(y) {
        return Err(DispatchError::Precondition(format!(
            "offsets span {} and {} rows but x and y have {} and {}",
            left[left.len() - 1],
            right[right.len() - 1],
            rows(x),
            rows(y)
        )));
    }
    Ok((left, right))
}

/// Feature width shared by `x`, `y` and the weight.
pub(crate) fn feature_width(
    x: &HostTensor,
    y: &HostTensor,
    weight: &HostTensor,
    dim_t: usize,
) -> Result<usize> {
    if x.dims.len() != 2 || y.dims.len() != 2 {
        return Err(anyhow!(
            "match_matrix_tensor expects rank 2 x and y, got {:?} and {:?}",
            x.dims,
            y.dims
        ));
    }
    let dim_in = x.dims[1];
    let expected = [dim_in, dim_t, dim_in];
    if y.dims[1] != dim_in || weight.dims.as_slice() != expected {
        return Err(anyhow!(
            "match_matrix_tensor shape mismatch: x {:?}, y {:?}, w {:?}",
            x.dims,
            y.dims,
            weight.dims
        ));
    }
    Ok(dim_in)
}

#[derive(Debug, Default)]
pub struct MatchMatrixHostKernel {
    params: Option<MatchMatrixParams>,
}

impl Kernel for MatchMatrixHostKernel {
    fn prepare(&mut self, ctx: &PrepareContext<'_>) -> Result<()> {
        let OperationKind::MatchMatrixTensor(params) = ctx.kind else {
            return Err(anyhow!(
                "match_matrix_tensor kernel prepared for {}",
                ctx.kind.tag()
            ));
        };
        self.params = Some(params.clone());
        Ok(())
    }

    fn run(&mut self, inputs: &[HostTensor]) -> Result<Vec<HostTensor>> {
        check_arity("match_matrix_tensor", inputs, 3)?;
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| anyhow!("match_matrix_tensor kernel used before prepare"))?;
        let (x_t, y_t, w_t) = (&inputs[0], &inputs[1], &inputs[2]);
        let dim_t = usize::try_from(params.dim_t)
            .map_err(|_| anyhow!("dim_t must be positive, got {}", params.dim_t))?;
        let (offset_l, offset_r) = input_offsets(x_t, y_t)?;
        let dim_in = feature_width(x_t, y_t, w_t, dim_t)?;
        let x = require_f32("match_matrix_tensor", 0, x_t)?;
        let y = require_f32("match_matrix_tensor", 1, y_t)?;
        let weight = match w_t.precision {
            Precision::Float32 => w_t.to_f32()?,
            precision if precision.is_fixed_point_i16() => {
                dequantize_fixed_i16(&w_t.data, params.weight_max)
            }
            other => {
                return Err(anyhow!(
                    "match_matrix_tensor weight must be Float32 or 16-bit fixed point, got {}",
                    other
                ))
            }
        };

        let result = match_matrix_forward(&MatchMatrixProblem {
            x: &x,
            y: &y,
            weight: &weight,
            offset_l,
            offset_r,
            dim_in,
            dim_t,
            activation: activation_for(params),
        })?;
        let rows = result.layout.output_len();
        let out = HostTensor::new(Precision::Float32, vec![rows, 1], encode_f32(&result.out))?
            .with_lod(result.layout.lod)?;
        let tmp = HostTensor::new(
            Precision::Float32,
            vec![x_t.dims[0], dim_t * dim_in],
            encode_f32(&result.tmp),
        )?;
        Ok(vec![out, tmp])
    }
}
