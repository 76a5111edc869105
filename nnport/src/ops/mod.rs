//! Kernels and their registry.
//!
//! A kernel is created from the registry for one operation, prepared once
//! with the operation's static description, and then run once per
//! invocation with concrete host tensors.
use std::rc::Rc;

use anyhow::{anyhow, Result};

use crate::backend::DeviceDriver;
use crate::graph::OperationKind;
use crate::tensor::HostTensor;
use crate::types::Operand;

pub mod accel;
pub mod host;
pub mod math;
pub mod registry;

pub use registry::{is_registered, lookup_kernel, registered_keys, KernelFactory, KernelKey};

/// Static view of the operation a kernel is prepared for.
pub struct PrepareContext<'a> {
    pub kind: &'a OperationKind,
    pub inputs: Vec<&'a Operand>,
    pub outputs: Vec<&'a Operand>,
    pub driver: Rc<dyn DeviceDriver>,
}

pub trait Kernel: std::fmt::Debug {
    /// Called once before the first `run`. Device resources acquired here
    /// live as long as the kernel.
    fn prepare(&mut self, ctx: &PrepareContext<'_>) -> Result<()>;

    fn run(&mut self, inputs: &[HostTensor]) -> Result<Vec<HostTensor>>;
}

pub(crate) fn check_arity(op: &str, inputs: &[HostTensor], expected: usize) -> Result<()> {
    if inputs.len() != expected {
        return Err(anyhow!(
            "{} expects {} inputs, got {}",
            op,
            expected,
            inputs.len()
        ));
    }
    Ok(())
}
