//! Arena-backed operand/operation graph.
//!
//! Operands and operations are addressed by stable indices into the model's
//! arenas. A model is populated through the builder methods, frozen with
//! [`Model::finish`], and read by inference and dispatch afterwards.
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::types::{Lifetime, Operand, OperandType};

use super::op_kind::OperationKind;
use super::validation::validate_model;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperandId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub usize);

impl std::fmt::Display for OperandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A compute node. It references operands but never owns them.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub inputs: Vec<OperandId>,
    pub outputs: Vec<OperandId>,
}

#[derive(Debug, Default)]
pub struct Model {
    operands: Vec<Operand>,
    operations: Vec<Operation>,
    input_operands: Vec<OperandId>,
    output_operands: Vec<OperandId>,
    identified: bool,
    finished: bool,
    execution_order: Vec<OperationId>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_mutable(&self) -> Result<(), ModelError> {
        if self.finished {
            return Err(ModelError::Finished);
        }
        Ok(())
    }

    fn check_operand(&self, id: OperandId) -> Result<(), ModelError> {
        if id.0 >= self.operands.len() {
            return Err(ModelError::DanglingOperand(id));
        }
        Ok(())
    }

    fn check_operation(&self, id: OperationId) -> Result<(), ModelError> {
        if id.0 >= self.operations.len() {
            return Err(ModelError::DanglingOperation(id));
        }
        Ok(())
    }

    /// Add an operand of type `ty`. Per-channel scales are copied into storage
    /// owned by the new operand.
    pub fn add_operand(&mut self, ty: &OperandType) -> Result<OperandId, ModelError> {
        self.ensure_mutable()?;
        ty.validate()?;
        let ty = ty.deep_copy()?;
        let id = OperandId(self.operands.len());
        self.operands.push(Operand { ty, buffer: None });
        Ok(id)
    }

    /// Bind constant bytes to an operand and mark it constant.
    pub fn set_operand_value(&mut self, id: OperandId, bytes: Vec<u8>) -> Result<(), ModelError> {
        self.ensure_mutable()?;
        self.check_operand(id)?;
        let operand = &mut self.operands[id.0];
        if matches!(
            operand.ty.lifetime,
            Lifetime::ModelInput | Lifetime::ModelOutput
        ) {
            return Err(ModelError::InvalidType(format!(
                "operand #{} is a model boundary and cannot hold a constant",
                id
            )));
        }
        let count = operand.ty.dimensions.production().ok_or_else(|| {
            ModelError::InvalidType(format!("constant operand #{} needs a known shape", id))
        })?;
        let expected = count * operand.ty.precision.byte_size();
        if bytes.len() != expected {
            return Err(ModelError::InvalidType(format!(
                "constant operand #{} expects {} bytes, got {}",
                id,
                expected,
                bytes.len()
            )));
        }
        operand.ty.lifetime = Lifetime::Constant;
        operand.buffer = Some(bytes);
        Ok(())
    }

    /// Add an operation with empty input and output lists.
    pub fn add_operation(&mut self, kind: OperationKind) -> Result<OperationId, ModelError> {
        self.ensure_mutable()?;
        let id = OperationId(self.operations.len());
        self.operations.push(Operation {
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
        Ok(id)
    }

    pub fn append_input(&mut self, op: OperationId, operand: OperandId) -> Result<(), ModelError> {
        self.ensure_mutable()?;
        self.check_operation(op)?;
        self.check_operand(operand)?;
        self.operations[op.0].inputs.push(operand);
        Ok(())
    }

    pub fn append_output(&mut self, op: OperationId, operand: OperandId) -> Result<(), ModelError> {
        self.ensure_mutable()?;
        self.check_operation(op)?;
        self.check_operand(operand)?;
        self.operations[op.0].outputs.push(operand);
        Ok(())
    }

    /// Add an operation and wire its operands in one step.
    pub fn add_operation_with(
        &mut self,
        kind: OperationKind,
        inputs: &[OperandId],
        outputs: &[OperandId],
    ) -> Result<OperationId, ModelError> {
        let op = self.add_operation(kind)?;
        for input in inputs {
            self.append_input(op, *input)?;
        }
        for output in outputs {
            self.append_output(op, *output)?;
        }
        Ok(op)
    }

    /// Record the model boundary and retag the lifetimes of its operands.
    pub fn identify_inputs_and_outputs(
        &mut self,
        inputs: &[OperandId],
        outputs: &[OperandId],
    ) -> Result<(), ModelError> {
        self.ensure_mutable()?;
        if self.identified {
            return Err(ModelError::AlreadyIdentified);
        }
        for id in inputs.iter().chain(outputs.iter()) {
            self.check_operand(*id)?;
        }
        for id in inputs {
            self.operands[id.0].ty.lifetime = Lifetime::ModelInput;
        }
        for id in outputs {
            self.operands[id.0].ty.lifetime = Lifetime::ModelOutput;
        }
        self.input_operands = inputs.to_vec();
        self.output_operands = outputs.to_vec();
        self.identified = true;
        Ok(())
    }

    /// Validate the graph structure and freeze the model.
    pub fn finish(&mut self) -> Result<(), ModelError> {
        self.ensure_mutable()?;
        let order = validate_model(self)?;
        self.execution_order = order;
        self.finished = true;
        crate::trace!(
            "model finished: {} operands, {} operations",
            self.operands.len(),
            self.operations.len()
        );
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn is_identified(&self) -> bool {
        self.identified
    }

    pub fn operand(&self, id: OperandId) -> Result<&Operand, ModelError> {
        self.check_operand(id)?;
        Ok(&self.operands[id.0])
    }

    pub fn operand_type(&self, id: OperandId) -> Result<&OperandType, ModelError> {
        Ok(&self.operand(id)?.ty)
    }

    /// Mutable access for type inference. Fails once the model is finished.
    pub fn operand_type_mut(&mut self, id: OperandId) -> Result<&mut OperandType, ModelError> {
        self.ensure_mutable()?;
        self.check_operand(id)?;
        Ok(&mut self.operands[id.0].ty)
    }

    pub fn operation(&self, id: OperationId) -> Result<&Operation, ModelError> {
        self.check_operation(id)?;
        Ok(&self.operations[id.0])
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn input_operands(&self) -> &[OperandId] {
        &self.input_operands
    }

    pub fn output_operands(&self) -> &[OperandId] {
        &self.output_operands
    }

    /// Dependency order computed by [`Model::finish`]; empty before that.
    pub fn execution_order(&self) -> &[OperationId] {
        &self.execution_order
    }
}
