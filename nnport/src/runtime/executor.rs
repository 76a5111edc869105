use std::rc::Rc;

use anyhow::{anyhow, Context, Result};

use crate::backend::{Device, DeviceDriver};
use crate::error::DispatchError;
use crate::graph::{describe_operation, Model, OperandId, OperationId};
use crate::logging::OpScope;
use crate::ops::{lookup_kernel, Kernel, KernelKey, PrepareContext};
use crate::tensor::HostTensor;
use crate::types::{DataLayout, Operand, Precision, UNKNOWN_DIM};

struct Step {
    op: OperationId,
    device: Device,
    kernel: Box<dyn Kernel>,
}

/// Runs a finished model one operation at a time, in dependency order.
pub struct Executor<'a> {
    model: &'a Model,
    steps: Vec<Step>,
}

impl std::fmt::Debug for Executor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("steps", &self.steps.len())
            .finish()
    }
}

fn kernel_precision(model: &Model, first_input: Option<OperandId>) -> Result<(Precision, DataLayout)> {
    match first_input {
        Some(id) => {
            let ty = model.operand_type(id)?;
            Ok((ty.precision, ty.layout))
        }
        None => Ok((Precision::Float32, DataLayout::default())),
    }
}

impl<'a> Executor<'a> {
    /// Select and prepare one kernel per operation. Each operation runs on the
    /// first place in `places` that has a kernel for it.
    pub fn new(model: &'a Model, places: &[Device], driver: Rc<dyn DeviceDriver>) -> Result<Self> {
        if !model.is_finished() {
            return Err(anyhow!("executor needs a finished model"));
        }
        if places.is_empty() {
            return Err(anyhow!("executor needs at least one place"));
        }
        let mut steps = Vec::with_capacity(model.execution_order().len());
        for op_id in model.execution_order() {
            let op = model.operation(*op_id)?;
            let (precision, layout) = kernel_precision(model, op.inputs.first().copied())?;
            let (device, mut kernel) = places
                .iter()
                .find_map(|device| {
                    let key = KernelKey::new(op.kind.tag(), *device, precision, layout);
                    lookup_kernel(&key).map(|kernel| (*device, kernel))
                })
                .ok_or_else(|| {
                    anyhow!(
                        "no kernel for {} ({} {:?}) on {:?}",
                        op.kind.tag(),
                        precision,
                        layout,
                        places
                    )
                })?;
            let ctx = PrepareContext {
                kind: &op.kind,
                inputs: op
                    .inputs
                    .iter()
                    .map(|id| model.operand(*id))
                    .collect::<Result<Vec<_>, _>>()?,
                outputs: op
                    .outputs
                    .iter()
                    .map(|id| model.operand(*id))
                    .collect::<Result<Vec<_>, _>>()?,
                driver: Rc::clone(&driver),
            };
            kernel
                .prepare(&ctx)
                .with_context(|| format!("failed to prepare {} on {}", describe_operation(op), device))?;
            crate::trace!("placed {} on {}", describe_operation(op), device);
            steps.push(Step {
                op: *op_id,
                device,
                kernel,
            });
        }
        Ok(Self { model, steps })
    }

    /// Device chosen for `op`.
    pub fn placement(&self, op: OperationId) -> Option<Device> {
        self.steps
            .iter()
            .find(|step| step.op == op)
            .map(|step| step.device)
    }

    /// Bind `inputs` to the model inputs in order and return the model outputs.
    pub fn run(&mut self, inputs: &[HostTensor]) -> Result<Vec<HostTensor>> {
        let model = self.model;
        let mut values: Vec<Option<HostTensor>> = vec![None; model.operands().len()];
        if inputs.len() != model.input_operands().len() {
            return Err(anyhow!(
                "model takes {} inputs, got {}",
                model.input_operands().len(),
                inputs.len()
            ));
        }
        for (id, tensor) in model.input_operands().iter().zip(inputs) {
            check_binding(*id, model.operand(*id)?, tensor)?;
            values[id.0] = Some(tensor.clone());
        }
        for (idx, operand) in model.operands().iter().enumerate() {
            if operand.is_constant() {
                values[idx] = Some(constant_tensor(OperandId(idx), operand)?);
            }
        }

        for step in &mut self.steps {
            let op = model.operation(step.op)?;
            let args = op
                .inputs
                .iter()
                .map(|id| {
                    values[id.0].clone().ok_or_else(|| DispatchError::Unresolved {
                        what: format!("operand #{}", id),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let device = step.device.to_string();
            let _scope = OpScope::enter(step.op.0, op.kind.tag().as_str(), Some(&device));
            crate::trace!("run {}", describe_operation(op));
            let results = step
                .kernel
                .run(&args)
                .map_err(|err| {
                    crate::error!("{:#}", err);
                    err
                })
                .with_context(|| format!("failed to run {} on {}", describe_operation(op), step.device))?;
            if results.len() != op.outputs.len() {
                return Err(anyhow!(
                    "{} produced {} outputs, expected {}",
                    op.kind.tag(),
                    results.len(),
                    op.outputs.len()
                ));
            }
            for (id, value) in op.outputs.iter().zip(results) {
                values[id.0] = Some(value);
            }
        }

        model
            .output_operands()
            .iter()
            .map(|id| {
                values[id.0].clone().ok_or_else(|| {
                    anyhow::Error::from(DispatchError::Unresolved {
                        what: format!("model output #{}", id),
                    })
                })
            })
            .collect()
    }
}

fn check_binding(id: OperandId, operand: &Operand, tensor: &HostTensor) -> Result<()> {
    let ty = &operand.ty;
    if tensor.precision != ty.precision {
        return Err(anyhow!(
            "input #{} expects {}, got {}",
            id,
            ty.precision,
            tensor.precision
        ));
    }
    if tensor.dims.len() != ty.rank() {
        return Err(anyhow!(
            "input #{} expects rank {}, got {:?}",
            id,
            ty.rank(),
            tensor.dims
        ));
    }
    for (axis, (expected, actual)) in ty.dimensions.data.iter().zip(&tensor.dims).enumerate() {
        if *expected != UNKNOWN_DIM && !ty.is_dynamic_axis(axis) && *expected as usize != *actual {
            return Err(anyhow!(
                "input #{} expects {} on axis {}, got {}",
                id,
                expected,
                axis,
                actual
            ));
        }
    }
    if ty.lod_level as usize > tensor.lod.depth() {
        return Err(anyhow!(
            "input #{} expects {} offset levels, got {}",
            id,
            ty.lod_level,
            tensor.lod.depth()
        ));
    }
    Ok(())
}

fn constant_tensor(id: OperandId, operand: &Operand) -> Result<HostTensor> {
    let unresolved = || DispatchError::Unresolved {
        what: format!("constant #{}", id),
    };
    let bytes = operand.buffer.as_ref().ok_or_else(unresolved)?;
    let dims = operand
        .ty
        .dimensions
        .data
        .iter()
        .map(|dim| usize::try_from(*dim).map_err(|_| unresolved()))
        .collect::<Result<Vec<_>, _>>()?;
    HostTensor::new(operand.ty.precision, dims, bytes.clone())
}
