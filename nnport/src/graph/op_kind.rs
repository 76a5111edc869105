use serde::{Deserialize, Serialize};

/// How spatial padding is derived for windowed operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutoPad {
    #[default]
    Explicit,
    Same,
    Valid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolKind {
    #[default]
    Max,
    Avg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool2dParams {
    pub kind: PoolKind,
    /// `[height, width]`
    pub kernel: [i32; 2],
    /// `[height, width]`
    pub strides: [i32; 2],
    /// `[top, bottom, left, right]`
    pub pads: [i32; 4],
    pub auto_pad: AutoPad,
    pub ceil_mode: bool,
    pub global_pooling: bool,
    pub count_include_pad: bool,
}

impl Default for Pool2dParams {
    fn default() -> Self {
        Self {
            kind: PoolKind::Max,
            kernel: [1, 1],
            strides: [1, 1],
            pads: [0; 4],
            auto_pad: AutoPad::Explicit,
            ceil_mode: false,
            global_pooling: false,
            count_include_pad: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchMatrixParams {
    /// Number of interaction channels between the two sequences.
    pub dim_t: i32,
    pub fuse_relu: bool,
    /// Absolute maximum the fixed-point weights were quantized against.
    pub weight_max: f32,
    /// Set once the weights have been converted to 16-bit fixed point.
    pub float_to_fix: bool,
}

/// Operation kind together with its static attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperationKind {
    PRelu,
    Pool2d(Pool2dParams),
    Stack { axis: i32 },
    ReduceMin { axes: Vec<i32>, keep_dim: bool },
    MatchMatrixTensor(MatchMatrixParams),
}

/// Attribute-free discriminant of [`OperationKind`], used as a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpTag {
    PRelu,
    Pool2d,
    Stack,
    ReduceMin,
    MatchMatrixTensor,
}

impl OperationKind {
    pub fn tag(&self) -> OpTag {
        match self {
            OperationKind::PRelu => OpTag::PRelu,
            OperationKind::Pool2d(_) => OpTag::Pool2d,
            OperationKind::Stack { .. } => OpTag::Stack,
            OperationKind::ReduceMin { .. } => OpTag::ReduceMin,
            OperationKind::MatchMatrixTensor(_) => OpTag::MatchMatrixTensor,
        }
    }
}

impl OpTag {
    pub fn as_str(self) -> &'static str {
        match self {
            OpTag::PRelu => "prelu",
            OpTag::Pool2d => "pool2d",
            OpTag::Stack => "stack",
            OpTag::ReduceMin => "reduce_min",
            OpTag::MatchMatrixTensor => "match_matrix_tensor",
        }
    }
}

impl std::fmt::Display for OpTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OpTag {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value {
            "prelu" => Ok(OpTag::PRelu),
            "pool2d" => Ok(OpTag::Pool2d),
            "stack" => Ok(OpTag::Stack),
            "reduce_min" => Ok(OpTag::ReduceMin),
            "match_matrix_tensor" => Ok(OpTag::MatchMatrixTensor),
            _ => Err(anyhow::anyhow!("unsupported op {}", value)),
        }
    }
}
