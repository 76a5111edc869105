use std::rc::Rc;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;

use crate::backend::{Device, DeviceDriver, LodArg, MatchMatrixArgs, ScratchPad};
use crate::error::DispatchError;
use crate::graph::{MatchMatrixParams, OpTag, OperationKind};
use crate::lod::match_matrix_lod;
use crate::ops::host::match_matrix::{activation_for, feature_width, input_offsets};
use crate::ops::registry::{build_entries, KernelFactory, KernelKey};
use crate::ops::{check_arity, Kernel, PrepareContext};
use crate::tensor::{encode_f32, HostTensor};
use crate::types::{DataLayout, Precision};

pub static ENTRIES: Lazy<Vec<(KernelKey, KernelFactory)>> = Lazy::new(|| {
    build_entries(
        OpTag::MatchMatrixTensor,
        Device::Accel,
        Precision::Float32,
        &[DataLayout::Nchw],
        create,
    )
});

fn create() -> Box<dyn Kernel> {
    Box::new(MatchMatrixTensorKernel::default())
}

/// Device resources acquired once at prepare.
#[derive(Debug)]
struct Resources {
    driver: Rc<dyn DeviceDriver>,
    weight_max: ScratchPad,
    offset_l: ScratchPad,
    offset_r: ScratchPad,
    /// Weights staged at prepare when they are a model constant.
    weight: Option<(Precision, ScratchPad)>,
    lod_capacity: usize,
}

#[derive(Debug, Default)]
pub struct MatchMatrixTensorKernel {
    params: Option<MatchMatrixParams>,
    resources: Option<Resources>,
}

fn stage_offsets(pad: &ScratchPad, offsets: &[usize]) -> Result<Vec<i32>> {
    let host = offsets
        .iter()
        .map(|offset| {
            i32::try_from(*offset).map_err(|_| {
                DispatchError::Precondition(format!("offset {} exceeds the device range", offset))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    pad.upload(bytemuck::cast_slice::<i32, u8>(&host))?;
    Ok(host)
}

impl MatchMatrixTensorKernel {
    fn check_fixed_point(params: &MatchMatrixParams, weight: Precision) -> Result<(), DispatchError> {
        if !params.float_to_fix || !weight.is_fixed_point_i16() {
            crate::critical!(
                "match_matrix_tensor: W should be fixed point (float_to_fix={}, precision={})",
                params.float_to_fix,
                weight
            );
            return Err(DispatchError::Precondition(format!(
                "weights must be converted to 16-bit fixed point, got {} with float_to_fix={}",
                weight, params.float_to_fix
            )));
        }
        Ok(())
    }
}

impl Kernel for MatchMatrixTensorKernel {
    fn prepare(&mut self, ctx: &PrepareContext<'_>) -> Result<()> {
        let OperationKind::MatchMatrixTensor(params) = ctx.kind else {
            return Err(anyhow!(
                "match_matrix_tensor kernel prepared for {}",
                ctx.kind.tag()
            ));
        };
        let driver = Rc::clone(&ctx.driver);
        let ptr_size = driver.max_ptr_size();
        let lod_capacity = driver.max_lod_size();

        let broadcast = vec![params.weight_max; ptr_size];
        let weight_max = ScratchPad::with_data(&driver, &encode_f32(&broadcast))?;
        let offset_l = ScratchPad::allocate(&driver, lod_capacity * std::mem::size_of::<i32>())?;
        let offset_r = ScratchPad::allocate(&driver, lod_capacity * std::mem::size_of::<i32>())?;

        let weight = match ctx.inputs.get(2) {
            Some(operand) => match &operand.buffer {
                Some(bytes) if operand.is_constant() => Some((
                    operand.ty.precision,
                    ScratchPad::with_data(&driver, bytes)?,
                )),
                _ => None,
            },
            None => None,
        };
        crate::trace!(
            "match_matrix_tensor prepared on {}: ptr_size={}, lod capacity={}, constant weights={}",
            driver.name(),
            ptr_size,
            lod_capacity,
            weight.is_some()
        );

        self.params = Some(params.clone());
        self.resources = Some(Resources {
            driver,
            weight_max,
            offset_l,
            offset_r,
            weight,
            lod_capacity,
        });
        Ok(())
    }

    fn run(&mut self, inputs: &[HostTensor]) -> Result<Vec<HostTensor>> {
        check_arity("match_matrix_tensor", inputs, 3)?;
        let (Some(params), Some(res)) = (self.params.as_ref(), self.resources.as_ref()) else {
            return Err(anyhow!("match_matrix_tensor kernel used before prepare"));
        };
        let (x, y, w) = (&inputs[0], &inputs[1], &inputs[2]);
        let weight_precision = res
            .weight
            .as_ref()
            .map(|(precision, _)| *precision)
            .unwrap_or(w.precision);
        Self::check_fixed_point(params, weight_precision)?;
        for (idx, tensor) in [x, y].iter().enumerate() {
            if tensor.precision != Precision::Float32 {
                return Err(anyhow!(
                    "match_matrix_tensor input {} must be Float32, got {}",
                    idx,
                    tensor.precision
                ));
            }
        }

        let dim_t = usize::try_from(params.dim_t)
            .map_err(|_| anyhow!("dim_t must be positive, got {}", params.dim_t))?;
        let (offset_l, offset_r) = input_offsets(x, y)?;
        let dim_in = feature_width(x, y, w, dim_t)?;
        if offset_l.len() > res.lod_capacity {
            return Err(DispatchError::Capacity {
                what: "sequence offsets",
                required: offset_l.len(),
                capacity: res.lod_capacity,
            }
            .into());
        }
        // Output extents come from the runtime offsets, not the inferred shape.
        let layout = match_matrix_lod(offset_l, offset_r, dim_t)?;

        let driver = &res.driver;
        let host_l = stage_offsets(&res.offset_l, offset_l)?;
        let host_r = stage_offsets(&res.offset_r, offset_r)?;
        let x_pad = ScratchPad::with_data(driver, &x.data)?;
        let y_pad = ScratchPad::with_data(driver, &y.data)?;
        let staged_weight;
        let weight = match &res.weight {
            Some((_, pad)) => pad.buffer(),
            None => {
                staged_weight = ScratchPad::with_data(driver, &w.data)?;
                staged_weight.buffer()
            }
        };
        let out_len = layout.output_len();
        let tmp_len = x.dims[0] * dim_t * dim_in;
        let out_pad = ScratchPad::allocate(driver, out_len * std::mem::size_of::<f32>())?;
        let tmp_pad = ScratchPad::allocate(driver, tmp_len * std::mem::size_of::<f32>())?;

        let args = MatchMatrixArgs {
            x: x_pad.buffer(),
            y: y_pad.buffer(),
            weight,
            out: out_pad.buffer(),
            tmp: tmp_pad.buffer(),
            weight_max: res.weight_max.buffer(),
            dim_in,
            dim_t,
            offset_l: LodArg {
                host: &host_l,
                device: res.offset_l.buffer(),
            },
            offset_r: LodArg {
                host: &host_r,
                device: res.offset_r.buffer(),
            },
            activation: activation_for(params),
        };
        crate::device_call!("match_matrix_tensor", driver.match_matrix_tensor(&args))?;

        let mut out_bytes = vec![0u8; out_len * std::mem::size_of::<f32>()];
        out_pad.download(&mut out_bytes)?;
        let mut tmp_bytes = vec![0u8; tmp_len * std::mem::size_of::<f32>()];
        tmp_pad.download(&mut tmp_bytes)?;

        let out = HostTensor::new(Precision::Float32, vec![out_len, 1], out_bytes)?
            .with_lod(layout.lod)?;
        let tmp = HostTensor::new(Precision::Float32, vec![x.dims[0], dim_t * dim_in], tmp_bytes)?;
        Ok(vec![out, tmp])
    }
}
