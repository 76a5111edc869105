mod describe;
mod model;
mod op_kind;
mod validation;

pub use describe::{describe_operation, operand_to_string};
pub use model::{Model, OperandId, Operation, OperationId};
pub(crate) use validation::operation_order;
pub use op_kind::{AutoPad, MatchMatrixParams, OpTag, OperationKind, Pool2dParams, PoolKind};
