mod dims;
mod operand;
mod precision;
mod quant;

pub use dims::{Dimensions, UNKNOWN_DIM};
pub use operand::{Operand, OperandType};
pub use precision::{DataLayout, Lifetime, Precision};
pub use quant::{PerChannelQuant, QuantParams, ScaleBuffer};
