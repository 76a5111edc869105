//! Error taxonomy shared by graph construction and dispatch.
use thiserror::Error;

use crate::graph::{OperandId, OperationId};

/// Build-time failures. All of them are fatal to graph construction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("model is finished and can no longer be modified")]
    Finished,
    #[error("inputs and outputs were already identified")]
    AlreadyIdentified,
    #[error("inputs and outputs must be identified before finishing")]
    MissingIdentification,
    #[error("operand #{0} does not belong to this model")]
    DanglingOperand(OperandId),
    #[error("operation #{0} does not belong to this model")]
    DanglingOperation(OperationId),
    #[error("operand #{operand} is produced by {count} operations")]
    MultipleProducers { operand: OperandId, count: usize },
    #[error("operand #{operand} is consumed by operation #{operation} but never produced")]
    Unproduced {
        operand: OperandId,
        operation: OperationId,
    },
    #[error("model output #{0} is not produced by any operation")]
    UnproducedOutput(OperandId),
    #[error("operand #{0} is a model input or constant and cannot be produced")]
    ProducedInput(OperandId),
    #[error("operations form a cycle through operation #{0}")]
    Cycle(OperationId),
    #[error("operand #{operand} has an unresolved dimension on axis {axis}")]
    UnresolvedDimension { operand: OperandId, axis: usize },
    #[error("operand #{0} is read before its shape was inferred")]
    Uninferred(OperandId),
    #[error("invalid operand type: {0}")]
    InvalidType(String),
    #[error("failed to allocate {count} per-channel scales")]
    ScaleAllocation { count: usize },
}

/// Runtime failures. Each one aborts the dispatch in progress.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("{call} returned native status {status}")]
    Backend { call: &'static str, status: i32 },
    #[error("precondition violated: {0}")]
    Precondition(String),
    #[error("{what} needs a resolved value at dispatch time")]
    Unresolved { what: String },
    #[error("{what} needs {required} slots but capacity is {capacity}")]
    Capacity {
        what: &'static str,
        required: usize,
        capacity: usize,
    },
    #[error("device allocation of {bytes} bytes failed with status {status}")]
    Resource { bytes: usize, status: i32 },
}
