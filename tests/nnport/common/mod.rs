use std::env;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use nnport::backend::{Device, DeviceDriver, HostDevice};
use nnport::ops::{lookup_kernel, Kernel, KernelKey, PrepareContext};
use nnport::{DataLayout, DeviceSettings, Lod, OpTag, Operand, OperandType, OperationKind, Precision};

const F32_TOL: f32 = 1e-4;

pub fn test_targets() -> Vec<Device> {
    let raw = env::var("TEST_TARGETS").unwrap_or_else(|_| "host".to_string());
    let mut targets = Vec::new();
    for item in raw.split(',') {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed {
            "host" => targets.push(Device::Host),
            "accel" => targets.push(Device::Accel),
            other => {
                panic!(
                    "unknown TEST_TARGETS entry '{}'; expected host or accel",
                    other
                );
            }
        }
    }
    if targets.is_empty() {
        targets.push(Device::Host);
    }
    targets
}

/// Placement list for `device`: accelerator runs fall back to the host for
/// operations it has no kernel for.
pub fn places_for(device: Device) -> Vec<Device> {
    match device {
        Device::Host => vec![Device::Host],
        Device::Accel => vec![Device::Accel, Device::Host],
    }
}

pub fn host_device(settings: DeviceSettings) -> (Rc<HostDevice>, Rc<dyn DeviceDriver>) {
    let device = Rc::new(HostDevice::new(settings));
    let driver: Rc<dyn DeviceDriver> = device.clone();
    (device, driver)
}

pub fn f32_type(dims: &[i32]) -> OperandType {
    OperandType::new(Precision::Float32, dims.to_vec())
}

pub fn operand(ty: OperandType) -> Operand {
    Operand { ty, buffer: None }
}

pub fn to_fixed_i16(values: &[f32], max: f32) -> Vec<i16> {
    values
        .iter()
        .map(|v| (v / max * 32767.0).round() as i16)
        .collect()
}

pub fn i16_bytes(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

pub fn sequence(dims: Vec<usize>, values: &[f32], lengths: &[usize]) -> Result<nnport::HostTensor> {
    nnport::HostTensor::from_f32(dims, values)?.with_lod(Lod::from_lengths(lengths))
}

/// Look up and prepare a kernel for `kind` with the given operand views.
pub fn prepared_kernel(
    device: Device,
    kind: &OperationKind,
    inputs: &[Operand],
    outputs: &[Operand],
    driver: Rc<dyn DeviceDriver>,
) -> Result<Box<dyn Kernel>> {
    let tag: OpTag = kind.tag();
    let layout = inputs
        .first()
        .map(|input| input.ty.layout)
        .unwrap_or(DataLayout::Nchw);
    let key = KernelKey::new(tag, device, Precision::Float32, layout);
    let mut kernel = lookup_kernel(&key).ok_or_else(|| anyhow!("no kernel for {}", key))?;
    let ctx = PrepareContext {
        kind,
        inputs: inputs.iter().collect(),
        outputs: outputs.iter().collect(),
        driver,
    };
    kernel.prepare(&ctx)?;
    Ok(kernel)
}

pub fn assert_close(actual: &[f32], expected: &[f32]) -> Result<()> {
    if actual.len() != expected.len() {
        return Err(anyhow!(
            "length mismatch: actual {} expected {}",
            actual.len(),
            expected.len()
        ));
    }
    for (idx, (a, b)) in actual.iter().zip(expected).enumerate() {
        if a.is_nan() && b.is_nan() {
            continue;
        }
        let diff = (a - b).abs();
        if diff > F32_TOL * a.abs().max(b.abs()).max(1.0) {
            return Err(anyhow!("value mismatch at index {}: {} vs {}", idx, a, b));
        }
    }
    Ok(())
}
