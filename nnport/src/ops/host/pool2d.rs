use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;

use crate::backend::Device;
use crate::graph::{AutoPad, OpTag, OperationKind, Pool2dParams, PoolKind};
use crate::infer::{pool_output_size, update_pool_pads};
use crate::ops::registry::{build_entries, KernelFactory, KernelKey};
use crate::ops::{check_arity, Kernel, PrepareContext};
use crate::tensor::{encode_f32, HostTensor};
use crate::types::{DataLayout, Precision};

use super::{require_f32, HOST_LAYOUTS};

pub static ENTRIES: Lazy<Vec<(KernelKey, KernelFactory)>> = Lazy::new(|| {
    build_entries(
        OpTag::Pool2d,
        Device::Host,
        Precision::Float32,
        &HOST_LAYOUTS,
        create,
    )
});

fn create() -> Box<dyn Kernel> {
    Box::new(Pool2dKernel::default())
}

#[derive(Debug, Default)]
pub struct Pool2dKernel {
    params: Option<Pool2dParams>,
    layout: DataLayout,
}

/// Window geometry of one spatial axis.
#[derive(Debug, Clone, Copy)]
struct AxisWindow {
    input: usize,
    output: usize,
    kernel: i64,
    stride: i64,
    pad_begin: i64,
    pad_end: i64,
}

impl AxisWindow {
    fn resolve(input: usize, slot: usize, params: &Pool2dParams) -> Result<Self> {
        if params.global_pooling {
            return Ok(Self {
                input,
                output: 1,
                kernel: input as i64,
                stride: 1,
                pad_begin: 0,
                pad_end: 0,
            });
        }
        let extent = i32::try_from(input).map_err(|_| anyhow!("pool2d axis of {} is too large", input))?;
        let kernel = params.kernel[slot];
        let stride = params.strides[slot];
        let [pad_begin, pad_end] = update_pool_pads(
            extent,
            kernel,
            stride,
            params.auto_pad,
            [params.pads[slot * 2], params.pads[slot * 2 + 1]],
        )?;
        let output = pool_output_size(
            extent,
            kernel,
            AutoPad::Explicit,
            pad_begin,
            pad_end,
            stride,
            params.ceil_mode,
        )?;
        Ok(Self {
            input,
            output: output as usize,
            kernel: kernel as i64,
            stride: stride as i64,
            pad_begin: pad_begin as i64,
            pad_end: pad_end as i64,
        })
    }

    /// Clipped input range of output position `pos`, plus the padded span
    /// used when padding counts toward the average.
    fn range(&self, pos: usize) -> (usize, usize, i64) {
        let start = pos as i64 * self.stride - self.pad_begin;
        let end = (start + self.kernel).min(self.input as i64 + self.pad_end);
        let padded = end - start;
        let lo = start.max(0) as usize;
        let hi = end.min(self.input as i64).max(0) as usize;
        (lo, hi.max(lo), padded)
    }
}

impl Kernel for Pool2dKernel {
    fn prepare(&mut self, ctx: &PrepareContext<'_>) -> Result<()> {
        let OperationKind::Pool2d(params) = ctx.kind else {
            return Err(anyhow!("pool2d kernel prepared for {}", ctx.kind.tag()));
        };
        self.params = Some(params.clone());
        if let Some(input) = ctx.inputs.first() {
            self.layout = input.ty.layout;
        }
        Ok(())
    }

    fn run(&mut self, inputs: &[HostTensor]) -> Result<Vec<HostTensor>> {
        check_arity("pool2d", inputs, 1)?;
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| anyhow!("pool2d kernel used before prepare"))?;
        let x = require_f32("pool2d", 0, &inputs[0])?;
        let dims = &inputs[0].dims;
        if dims.len() != 4 {
            return Err(anyhow!("pool2d expects a rank 4 input, got {:?}", dims));
        }
        let [h_axis, w_axis] = self.layout.spatial_axes();
        let c_axis = match self.layout {
            DataLayout::Nchw => 1,
            DataLayout::Nhwc => 3,
        };
        let (batch, channels) = (dims[0], dims[c_axis]);
        let rows = AxisWindow::resolve(dims[h_axis], 0, params)?;
        let cols = AxisWindow::resolve(dims[w_axis], 1, params)?;

        let mut out_dims = dims.clone();
        out_dims[h_axis] = rows.output;
        out_dims[w_axis] = cols.output;
        let layout = self.layout;
        let index = |n: usize, c: usize, h: usize, w: usize, height: usize, width: usize| match layout {
            DataLayout::Nchw => ((n * channels + c) * height + h) * width + w,
            DataLayout::Nhwc => ((n * height + h) * width + w) * channels + c,
        };

        let mut out = vec![0.0f32; crate::tensor::numel(&out_dims)];
        for n in 0..batch {
            for c in 0..channels {
                for oh in 0..rows.output {
                    let (h0, h1, padded_h) = rows.range(oh);
                    for ow in 0..cols.output {
                        let (w0, w1, padded_w) = cols.range(ow);
                        let mut acc = match params.kind {
                            PoolKind::Max => f32::NEG_INFINITY,
                            PoolKind::Avg => 0.0,
                        };
                        for h in h0..h1 {
                            for w in w0..w1 {
                                let value = x[index(n, c, h, w, rows.input, cols.input)];
                                acc = match params.kind {
                                    PoolKind::Max => acc.max(value),
                                    PoolKind::Avg => acc + value,
                                };
                            }
                        }
                        let valid = (h1 - h0) * (w1 - w0);
                        let value = match params.kind {
                            _ if valid == 0 => 0.0,
                            PoolKind::Max => acc,
                            PoolKind::Avg if params.count_include_pad && !params.global_pooling => {
                                acc / (padded_h * padded_w) as f32
                            }
                            PoolKind::Avg => acc / valid as f32,
                        };
                        out[index(n, c, oh, ow, rows.output, cols.output)] = value;
                    }
                }
            }
        }
        let y = HostTensor::new(Precision::Float32, out_dims, encode_f32(&out))?;
        Ok(vec![y])
    }
}
