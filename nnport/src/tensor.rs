use anyhow::{anyhow, Result};

use crate::lod::Lod;
use crate::types::Precision;

pub fn numel(dims: &[usize]) -> usize {
    dims.iter().copied().product::<usize>()
}

/// A runtime value bound to an operand. Elements are stored in native byte order.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTensor {
    pub precision: Precision,
    pub dims: Vec<usize>,
    pub data: Vec<u8>,
    pub lod: Lod,
}

impl HostTensor {
    pub fn new(precision: Precision, dims: Vec<usize>, data: Vec<u8>) -> Result<Self> {
        let expected = numel(&dims) * precision.byte_size();
        if data.len() != expected {
            return Err(anyhow!(
                "{} tensor of shape {:?} needs {} bytes, got {}",
                precision,
                dims,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            precision,
            dims,
            data,
            lod: Lod::default(),
        })
    }

    pub fn zeros(precision: Precision, dims: Vec<usize>) -> Self {
        let len = numel(&dims) * precision.byte_size();
        Self {
            precision,
            dims,
            data: vec![0; len],
            lod: Lod::default(),
        }
    }

    pub fn from_f32(dims: Vec<usize>, values: &[f32]) -> Result<Self> {
        Self::new(
            Precision::Float32,
            dims,
            bytemuck::cast_slice::<f32, u8>(values).to_vec(),
        )
    }

    pub fn from_i16(precision: Precision, dims: Vec<usize>, values: &[i16]) -> Result<Self> {
        if precision.byte_size() != 2 {
            return Err(anyhow!("{} is not a 16-bit precision", precision));
        }
        Self::new(precision, dims, bytemuck::cast_slice::<i16, u8>(values).to_vec())
    }

    /// Attach sequence offsets. The deepest level must span the leading axis.
    pub fn with_lod(mut self, lod: Lod) -> Result<Self> {
        lod.validate()?;
        if !lod.is_empty() {
            let rows = self.dims.first().copied().unwrap_or(1);
            let span = lod.total(lod.depth() - 1)?;
            if span != rows {
                return Err(anyhow!(
                    "lod spans {} rows but the tensor has {}",
                    span,
                    rows
                ));
            }
        }
        self.lod = lod;
        Ok(self)
    }

    pub fn numel(&self) -> usize {
        numel(&self.dims)
    }

    pub fn to_f32(&self) -> Result<Vec<f32>> {
        if self.precision != Precision::Float32 {
            return Err(anyhow!("expected Float32 tensor, got {}", self.precision));
        }
        Ok(decode_f32(&self.data))
    }

    pub fn to_i16(&self) -> Result<Vec<i16>> {
        if self.precision.byte_size() != 2 || self.precision.is_float() {
            return Err(anyhow!("expected a 16-bit integer tensor, got {}", self.precision));
        }
        Ok(self
            .data
            .chunks_exact(2)
            .map(bytemuck::pod_read_unaligned::<i16>)
            .collect())
    }
}

pub(crate) fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(bytemuck::pod_read_unaligned::<f32>)
        .collect()
}

pub(crate) fn encode_f32(values: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice::<f32, u8>(values).to_vec()
}
