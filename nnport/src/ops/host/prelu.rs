use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;

use crate::backend::Device;
use crate::graph::OpTag;
use crate::ops::registry::{build_entries, KernelFactory, KernelKey};
use crate::ops::{check_arity, Kernel, PrepareContext};
use crate::tensor::{encode_f32, HostTensor};
use crate::types::{DataLayout, Precision};

use super::{require_f32, HOST_LAYOUTS};

pub static ENTRIES: Lazy<Vec<(KernelKey, KernelFactory)>> = Lazy::new(|| {
    build_entries(
        OpTag::PRelu,
        Device::Host,
        Precision::Float32,
        &HOST_LAYOUTS,
        create,
    )
});

fn create() -> Box<dyn Kernel> {
    Box::new(PReluKernel::default())
}

#[derive(Debug, Default)]
pub struct PReluKernel {
    layout: DataLayout,
}

/// Channel axis of `dims`, or `None` for inputs without one.
fn channel_axis(dims: &[usize], layout: DataLayout) -> Option<usize> {
    match (dims.len(), layout) {
        (0 | 1, _) => None,
        (_, DataLayout::Nchw) => Some(1),
        (rank, DataLayout::Nhwc) => Some(rank - 1),
    }
}

#[derive(Debug, Clone, Copy)]
enum SlopeMode {
    Shared,
    Elementwise,
    Channel { inner: usize, channels: usize },
}

impl SlopeMode {
    fn index(self, idx: usize) -> usize {
        match self {
            SlopeMode::Shared => 0,
            SlopeMode::Elementwise => idx,
            SlopeMode::Channel { inner, channels } => (idx / inner) % channels,
        }
    }
}

impl Kernel for PReluKernel {
    fn prepare(&mut self, ctx: &PrepareContext<'_>) -> Result<()> {
        if let Some(input) = ctx.inputs.first() {
            self.layout = input.ty.layout;
        }
        Ok(())
    }

    fn run(&mut self, inputs: &[HostTensor]) -> Result<Vec<HostTensor>> {
        check_arity("prelu", inputs, 2)?;
        let x = require_f32("prelu", 0, &inputs[0])?;
        let slope = require_f32("prelu", 1, &inputs[1])?;
        let dims = &inputs[0].dims;

        let mode = if slope.len() == 1 {
            SlopeMode::Shared
        } else if slope.len() == x.len() {
            SlopeMode::Elementwise
        } else {
            let axis = channel_axis(dims, self.layout).ok_or_else(|| {
                anyhow!("prelu slope of {} values needs a channel axis", slope.len())
            })?;
            if dims[axis] != slope.len() {
                return Err(anyhow!(
                    "prelu slope has {} values for {} channels",
                    slope.len(),
                    dims[axis]
                ));
            }
            SlopeMode::Channel {
                inner: dims[axis + 1..].iter().product::<usize>(),
                channels: dims[axis],
            }
        };

        let out = x
            .iter()
            .enumerate()
            .map(|(idx, value)| {
                if *value > 0.0 {
                    *value
                } else {
                    value * slope[mode.index(idx)]
                }
            })
            .collect::<Vec<_>>();
        let mut y = HostTensor::new(Precision::Float32, dims.clone(), encode_f32(&out))?;
        y.lod = inputs[0].lod.clone();
        Ok(vec![y])
    }
}
