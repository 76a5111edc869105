//! Portable host kernels over `Float32` tensors.
use anyhow::{anyhow, Result};

use crate::tensor::HostTensor;
use crate::types::{DataLayout, Precision};

pub mod match_matrix;
pub mod pool2d;
pub mod prelu;
pub mod reduce_min;
pub mod stack;

pub(crate) const HOST_LAYOUTS: [DataLayout; 2] = [DataLayout::Nchw, DataLayout::Nhwc];

pub(crate) fn require_f32(op: &str, index: usize, tensor: &HostTensor) -> Result<Vec<f32>> {
    if tensor.precision != Precision::Float32 {
        return Err(anyhow!(
            "{} input {} must be Float32, got {}",
            op,
            index,
            tensor.precision
        ));
    }
    tensor.to_f32()
}
