use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;

use crate::backend::Device;
use crate::graph::{OpTag, OperationKind};
use crate::infer::normalize_axis;
use crate::ops::registry::{build_entries, KernelFactory, KernelKey};
use crate::ops::{Kernel, PrepareContext};
use crate::tensor::{encode_f32, HostTensor};
use crate::types::Precision;

use super::{require_f32, HOST_LAYOUTS};

pub static ENTRIES: Lazy<Vec<(KernelKey, KernelFactory)>> = Lazy::new(|| {
    build_entries(
        OpTag::Stack,
        Device::Host,
        Precision::Float32,
        &HOST_LAYOUTS,
        create,
    )
});

fn create() -> Box<dyn Kernel> {
    Box::new(StackKernel::default())
}

#[derive(Debug, Default)]
pub struct StackKernel {
    axis: Option<i32>,
}

impl Kernel for StackKernel {
    fn prepare(&mut self, ctx: &PrepareContext<'_>) -> Result<()> {
        let OperationKind::Stack { axis } = ctx.kind else {
            return Err(anyhow!("stack kernel prepared for {}", ctx.kind.tag()));
        };
        self.axis = Some(*axis);
        Ok(())
    }

    fn run(&mut self, inputs: &[HostTensor]) -> Result<Vec<HostTensor>> {
        let axis = self
            .axis
            .ok_or_else(|| anyhow!("stack kernel used before prepare"))?;
        let first = inputs
            .first()
            .ok_or_else(|| anyhow!("stack expects at least one input"))?;
        let dims = &first.dims;
        let axis = normalize_axis(axis, dims.len() + 1)?;
        let values = inputs
            .iter()
            .enumerate()
            .map(|(idx, input)| {
                if input.dims != *dims {
                    return Err(anyhow!(
                        "stack input {} has shape {:?}, expected {:?}",
                        idx,
                        input.dims,
                        dims
                    ));
                }
                require_f32("stack", idx, input)
            })
            .collect::<Result<Vec<_>>>()?;

        let outer = dims[..axis].iter().product::<usize>();
        let inner = dims[axis..].iter().product::<usize>();
        let mut out = Vec::with_capacity(outer * inner * values.len());
        for o in 0..outer {
            for value in &values {
                out.extend_from_slice(&value[o * inner..(o + 1) * inner]);
            }
        }
        let mut out_dims = dims.clone();
        out_dims.insert(axis, values.len());
        let y = HostTensor::new(Precision::Float32, out_dims, encode_f32(&out))?;
        Ok(vec![y])
    }
}
