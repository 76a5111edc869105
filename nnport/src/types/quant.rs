use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Owned per-channel scale storage.
///
/// Cloning copies the scales; two buffers never share memory even when their
/// values are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleBuffer {
    scales: Box<[f32]>,
}

impl ScaleBuffer {
    /// Copy `scales` into a freshly allocated buffer.
    pub fn copy_from(scales: &[f32]) -> Result<Self, ModelError> {
        let mut owned = Vec::new();
        owned
            .try_reserve_exact(scales.len())
            .map_err(|_| ModelError::ScaleAllocation {
                count: scales.len(),
            })?;
        owned.extend_from_slice(scales);
        Ok(Self {
            scales: owned.into_boxed_slice(),
        })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.scales
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.scales
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    pub fn as_ptr(&self) -> *const f32 {
        self.scales.as_ptr()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerChannelQuant {
    pub scales: ScaleBuffer,
    pub channel_dim: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum QuantParams {
    #[default]
    None,
    PerTensor { scale: f32, zero_point: i32 },
    PerChannel(PerChannelQuant),
}

impl QuantParams {
    pub fn per_tensor(scale: f32, zero_point: i32) -> Self {
        QuantParams::PerTensor { scale, zero_point }
    }

    pub fn per_channel(scales: &[f32], channel_dim: u32) -> Result<Self, ModelError> {
        Ok(QuantParams::PerChannel(PerChannelQuant {
            scales: ScaleBuffer::copy_from(scales)?,
            channel_dim,
        }))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, QuantParams::None)
    }

    pub fn channel_scales(&self) -> Option<&[f32]> {
        match self {
            QuantParams::PerChannel(params) => Some(params.scales.as_slice()),
            _ => None,
        }
    }

    pub(crate) fn deep_copy(&self) -> Result<Self, ModelError> {
        match self {
            QuantParams::PerChannel(params) => Ok(QuantParams::PerChannel(PerChannelQuant {
                scales: ScaleBuffer::copy_from(params.scales.as_slice())?,
                channel_dim: params.channel_dim,
            })),
            other => Ok(other.clone()),
        }
    }
}
