use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;

use crate::backend::Device;
use crate::graph::{OpTag, OperationKind};
use crate::infer::reduction_axes;
use crate::ops::registry::{build_entries, KernelFactory, KernelKey};
use crate::ops::{check_arity, Kernel, PrepareContext};
use crate::tensor::{encode_f32, HostTensor};
use crate::types::Precision;

use super::{require_f32, HOST_LAYOUTS};

pub static ENTRIES: Lazy<Vec<(KernelKey, KernelFactory)>> = Lazy::new(|| {
    build_entries(
        OpTag::ReduceMin,
        Device::Host,
        Precision::Float32,
        &HOST_LAYOUTS,
        create,
    )
});

fn create() -> Box<dyn Kernel> {
    Box::new(ReduceMinKernel::default())
}

#[derive(Debug, Default)]
pub struct ReduceMinKernel {
    attrs: Option<(Vec<i32>, bool)>,
}

impl Kernel for ReduceMinKernel {
    fn prepare(&mut self, ctx: &PrepareContext<'_>) -> Result<()> {
        let OperationKind::ReduceMin { axes, keep_dim } = ctx.kind else {
            return Err(anyhow!("reduce_min kernel prepared for {}", ctx.kind.tag()));
        };
        self.attrs = Some((axes.clone(), *keep_dim));
        Ok(())
    }

    fn run(&mut self, inputs: &[HostTensor]) -> Result<Vec<HostTensor>> {
        check_arity("reduce_min", inputs, 1)?;
        let (axes, keep_dim) = self
            .attrs
            .as_ref()
            .ok_or_else(|| anyhow!("reduce_min kernel used before prepare"))?;
        let x = require_f32("reduce_min", 0, &inputs[0])?;
        let dims = &inputs[0].dims;
        let axes = reduction_axes(axes, dims.len())?;
        if x.is_empty() {
            return Err(anyhow!("reduce_min over an empty tensor of shape {:?}", dims));
        }

        // Output strides with reduced axes contributing nothing.
        let mut strides = vec![0usize; dims.len()];
        let mut stride = 1usize;
        for axis in (0..dims.len()).rev() {
            if !axes.contains(&axis) {
                strides[axis] = stride;
                stride *= dims[axis];
            }
        }
        let mut out = vec![f32::INFINITY; stride];
        for (flat, value) in x.iter().enumerate() {
            let mut rest = flat;
            let mut target = 0usize;
            for axis in (0..dims.len()).rev() {
                let coord = rest % dims[axis];
                rest /= dims[axis];
                target += coord * strides[axis];
            }
            out[target] = out[target].min(*value);
        }

        let mut out_dims = Vec::with_capacity(dims.len());
        for (axis, dim) in dims.iter().enumerate() {
            if !axes.contains(&axis) {
                out_dims.push(*dim);
            } else if *keep_dim {
                out_dims.push(1);
            }
        }
        if out_dims.is_empty() {
            out_dims.push(1);
        }
        let y = HostTensor::new(Precision::Float32, out_dims, encode_f32(&out))?;
        Ok(vec![y])
    }
}
