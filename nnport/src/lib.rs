#[macro_use]
pub mod logging;

pub mod backend;
pub mod error;
pub mod graph;
pub mod infer;
pub mod lod;
pub mod ops;
pub mod runtime;
pub mod settings;
pub mod tensor;
pub mod types;

pub use backend::{Device, DeviceDriver, HostDevice};
pub use error::{DispatchError, ModelError};
pub use graph::{
    AutoPad, MatchMatrixParams, Model, OpTag, OperandId, Operation, OperationId, OperationKind,
    Pool2dParams, PoolKind,
};
pub use infer::{infer_model, infer_operation};
pub use lod::{match_matrix_lod, Lod, MatchMatrixLod};
pub use runtime::Executor;
pub use settings::DeviceSettings;
pub use tensor::HostTensor;
pub use types::{
    DataLayout, Dimensions, Lifetime, Operand, OperandType, Precision, QuantParams, UNKNOWN_DIM,
};
