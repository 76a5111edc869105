use serde::{Deserialize, Serialize};

use crate::error::ModelError;

use super::{DataLayout, Dimensions, Lifetime, Precision, QuantParams, UNKNOWN_DIM};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperandType {
    pub precision: Precision,
    #[serde(default)]
    pub layout: DataLayout,
    pub dimensions: Dimensions,
    #[serde(default)]
    pub lifetime: Lifetime,
    #[serde(default)]
    pub quant: QuantParams,
    /// Number of sequence-offset levels the runtime value carries.
    #[serde(default)]
    pub lod_level: u32,
}

impl OperandType {
    pub fn new(precision: Precision, dims: Vec<i32>) -> Self {
        Self {
            precision,
            layout: DataLayout::default(),
            dimensions: Dimensions::new(dims),
            lifetime: Lifetime::Temporary,
            quant: QuantParams::None,
            lod_level: 0,
        }
    }

    /// A placeholder for an output whose type inference will fill in.
    pub fn unresolved(precision: Precision) -> Self {
        Self {
            dimensions: Dimensions::pending(),
            ..Self::new(precision, Vec::new())
        }
    }

    /// True until inference has written a shape.
    pub fn is_pending(&self) -> bool {
        self.dimensions.pending
    }

    pub fn with_layout(mut self, layout: DataLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_quant(mut self, quant: QuantParams) -> Self {
        self.quant = quant;
        self
    }

    pub fn with_lod_level(mut self, lod_level: u32) -> Self {
        self.lod_level = lod_level;
        self
    }

    pub fn with_dynamic(mut self, dynamic: Vec<Vec<i32>>) -> Result<Self, ModelError> {
        self.dimensions = Dimensions::with_dynamic(self.dimensions.data, dynamic)?;
        Ok(self)
    }

    pub fn rank(&self) -> usize {
        self.dimensions.rank()
    }

    /// An axis is dynamic when alternatives describe it, or when it is the
    /// leading axis of a sequence operand whose extent comes from its offsets.
    pub fn is_dynamic_axis(&self, axis: usize) -> bool {
        self.dimensions.dynamic_count() > 0 || (axis == 0 && self.lod_level > 0)
    }

    /// First axis carrying the unknown marker without being dynamic.
    pub fn first_unresolved_axis(&self) -> Option<usize> {
        self.dimensions
            .data
            .iter()
            .enumerate()
            .find(|(axis, dim)| **dim == UNKNOWN_DIM && !self.is_dynamic_axis(*axis))
            .map(|(axis, _)| axis)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        self.dimensions.validate()?;
        let per_channel = matches!(self.quant, QuantParams::PerChannel(_));
        let per_tensor = matches!(self.quant, QuantParams::PerTensor { .. });
        if self.precision.is_per_channel() != per_channel {
            return Err(ModelError::InvalidType(format!(
                "{} requires {} quantization params",
                self.precision,
                if per_channel { "no per-channel" } else { "per-channel" }
            )));
        }
        if self.precision.is_quantized() && !self.precision.is_per_channel() && !per_tensor {
            return Err(ModelError::InvalidType(format!(
                "{} requires per-tensor quantization params",
                self.precision
            )));
        }
        if let QuantParams::PerChannel(params) = &self.quant {
            let axis = params.channel_dim as usize;
            if axis >= self.rank() {
                return Err(ModelError::InvalidType(format!(
                    "channel axis {} out of range for rank {}",
                    axis,
                    self.rank()
                )));
            }
            let channels = self.dimensions.data[axis];
            if channels != UNKNOWN_DIM && channels as usize != params.scales.len() {
                return Err(ModelError::InvalidType(format!(
                    "{} scales given for {} channels",
                    params.scales.len(),
                    channels
                )));
            }
        }
        Ok(())
    }

    /// Clone with per-channel scales copied into a fresh allocation.
    pub(crate) fn deep_copy(&self) -> Result<Self, ModelError> {
        Ok(Self {
            precision: self.precision,
            layout: self.layout,
            dimensions: self.dimensions.clone(),
            lifetime: self.lifetime,
            quant: self.quant.deep_copy()?,
            lod_level: self.lod_level,
        })
    }
}

/// A typed tensor slot. `buffer` stays empty until a value is bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub ty: OperandType,
    pub buffer: Option<Vec<u8>>,
}

impl Operand {
    pub fn is_constant(&self) -> bool {
        self.ty.lifetime == Lifetime::Constant
    }
}
