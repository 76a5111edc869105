use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Element precision of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Bool8,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float16,
    Float32,
    Float64,
    QuantInt8SymmPerLayer,
    QuantInt8SymmPerChannel,
    QuantUInt8AsymmPerLayer,
    QuantInt16SymmPerLayer,
    QuantInt16SymmPerChannel,
    QuantUInt16AsymmPerLayer,
    QuantInt32SymmPerLayer,
    QuantInt32SymmPerChannel,
    QuantUInt32AsymmPerLayer,
}

impl Precision {
    pub fn from_ident(ident: &str) -> Result<Self> {
        match ident {
            "bool8" => Ok(Precision::Bool8),
            "i8" => Ok(Precision::Int8),
            "u8" => Ok(Precision::UInt8),
            "i16" => Ok(Precision::Int16),
            "u16" => Ok(Precision::UInt16),
            "i32" => Ok(Precision::Int32),
            "u32" => Ok(Precision::UInt32),
            "i64" => Ok(Precision::Int64),
            "u64" => Ok(Precision::UInt64),
            "f16" => Ok(Precision::Float16),
            "f32" => Ok(Precision::Float32),
            "f64" => Ok(Precision::Float64),
            "qi8" => Ok(Precision::QuantInt8SymmPerLayer),
            "qi8c" => Ok(Precision::QuantInt8SymmPerChannel),
            "qu8" => Ok(Precision::QuantUInt8AsymmPerLayer),
            "qi16" => Ok(Precision::QuantInt16SymmPerLayer),
            "qi16c" => Ok(Precision::QuantInt16SymmPerChannel),
            "qu16" => Ok(Precision::QuantUInt16AsymmPerLayer),
            "qi32" => Ok(Precision::QuantInt32SymmPerLayer),
            "qi32c" => Ok(Precision::QuantInt32SymmPerChannel),
            "qu32" => Ok(Precision::QuantUInt32AsymmPerLayer),
            _ => Err(anyhow!("unsupported precision: {}", ident)),
        }
    }

    /// Size in bytes of one stored element.
    pub fn byte_size(self) -> usize {
        match self {
            Precision::Bool8
            | Precision::Int8
            | Precision::UInt8
            | Precision::QuantInt8SymmPerLayer
            | Precision::QuantInt8SymmPerChannel
            | Precision::QuantUInt8AsymmPerLayer => 1,
            Precision::Int16
            | Precision::UInt16
            | Precision::Float16
            | Precision::QuantInt16SymmPerLayer
            | Precision::QuantInt16SymmPerChannel
            | Precision::QuantUInt16AsymmPerLayer => 2,
            Precision::Int32
            | Precision::UInt32
            | Precision::Float32
            | Precision::QuantInt32SymmPerLayer
            | Precision::QuantInt32SymmPerChannel
            | Precision::QuantUInt32AsymmPerLayer => 4,
            Precision::Int64 | Precision::UInt64 | Precision::Float64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            Precision::Float16 | Precision::Float32 | Precision::Float64
        )
    }

    pub fn is_quantized(self) -> bool {
        matches!(
            self,
            Precision::QuantInt8SymmPerLayer
                | Precision::QuantInt8SymmPerChannel
                | Precision::QuantUInt8AsymmPerLayer
                | Precision::QuantInt16SymmPerLayer
                | Precision::QuantInt16SymmPerChannel
                | Precision::QuantUInt16AsymmPerLayer
                | Precision::QuantInt32SymmPerLayer
                | Precision::QuantInt32SymmPerChannel
                | Precision::QuantUInt32AsymmPerLayer
        )
    }

    pub fn is_per_channel(self) -> bool {
        matches!(
            self,
            Precision::QuantInt8SymmPerChannel
                | Precision::QuantInt16SymmPerChannel
                | Precision::QuantInt32SymmPerChannel
        )
    }

    /// True for the 16-bit fixed-point storage accepted by fixed-point kernels.
    pub fn is_fixed_point_i16(self) -> bool {
        matches!(self, Precision::Int16 | Precision::QuantInt16SymmPerLayer)
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Memory layout of a rank-4 activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataLayout {
    #[default]
    Nchw,
    Nhwc,
}

impl DataLayout {
    /// Axes holding height and width for this layout.
    pub fn spatial_axes(self) -> [usize; 2] {
        match self {
            DataLayout::Nchw => [2, 3],
            DataLayout::Nhwc => [1, 2],
        }
    }
}

/// Ownership and persistence of an operand's buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifetime {
    Constant,
    ModelInput,
    ModelOutput,
    #[default]
    Temporary,
}
