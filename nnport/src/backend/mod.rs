//! Device driver contract.
//!
//! A driver exposes raw device memory and native compute entry points. Every
//! call reports a status code where 0 means success; kernels convert non-zero
//! codes into [`DispatchError::Backend`](crate::error::DispatchError) with
//! [`device_call!`](crate::device_call).
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::ops::math::Activation;
use crate::settings::MAX_LOD_SIZE;

mod host_device;
mod scratch;

pub use host_device::{DeviceStats, HostDevice, STATUS_INVALID_ARGUMENT, STATUS_INVALID_HANDLE, STATUS_OUT_OF_MEMORY};
pub use scratch::ScratchPad;

pub const STATUS_SUCCESS: i32 = 0;

/// Where a kernel runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Host,
    Accel,
}

impl Device {
    pub fn as_str(self) -> &'static str {
        match self {
            Device::Host => "host",
            Device::Accel => "accel",
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Device {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "host" | "cpu" => Ok(Device::Host),
            "accel" | "xpu" => Ok(Device::Accel),
            other => Err(anyhow!("unknown device {}", other)),
        }
    }
}

/// Opaque handle to a device allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceBuffer(pub u64);

impl DeviceBuffer {
    pub const NULL: DeviceBuffer = DeviceBuffer(0);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyDirection {
    HostToDevice,
    DeviceToHost,
}

/// One host/device copy. The borrowed host side fixes the byte count.
#[derive(Debug)]
pub enum Transfer<'a> {
    HostToDevice { dst: DeviceBuffer, src: &'a [u8] },
    DeviceToHost { dst: &'a mut [u8], src: DeviceBuffer },
}

impl Transfer<'_> {
    pub fn direction(&self) -> CopyDirection {
        match self {
            Transfer::HostToDevice { .. } => CopyDirection::HostToDevice,
            Transfer::DeviceToHost { .. } => CopyDirection::DeviceToHost,
        }
    }

    pub fn bytes(&self) -> usize {
        match self {
            Transfer::HostToDevice { src, .. } => src.len(),
            Transfer::DeviceToHost { dst, .. } => dst.len(),
        }
    }
}

/// Offsets handed to a native primitive: the host copy plus its staged
/// device mirror.
#[derive(Debug, Clone, Copy)]
pub struct LodArg<'a> {
    pub host: &'a [i32],
    pub device: DeviceBuffer,
}

/// Arguments of the native match-matrix primitive. All tensors live on the
/// device; `weight` holds 16-bit fixed-point values scaled by `weight_max`.
#[derive(Debug, Clone, Copy)]
pub struct MatchMatrixArgs<'a> {
    pub x: DeviceBuffer,
    pub y: DeviceBuffer,
    pub weight: DeviceBuffer,
    pub out: DeviceBuffer,
    pub tmp: DeviceBuffer,
    pub weight_max: DeviceBuffer,
    pub dim_in: usize,
    pub dim_t: usize,
    pub offset_l: LodArg<'a>,
    pub offset_r: LodArg<'a>,
    pub activation: Activation,
}

pub trait DeviceDriver: std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Returns a status and, on success, the new handle.
    fn allocate(&self, bytes: usize) -> (i32, DeviceBuffer);

    fn free(&self, buffer: DeviceBuffer) -> i32;

    fn memcpy(&self, transfer: Transfer<'_>) -> i32;

    /// Width per-tensor maxima are broadcast to before staging.
    fn max_ptr_size(&self) -> usize;

    /// Capacity of the device-side offset tables.
    fn max_lod_size(&self) -> usize {
        MAX_LOD_SIZE
    }

    fn match_matrix_tensor(&self, args: &MatchMatrixArgs<'_>) -> i32;
}

/// Evaluate a driver call and turn a non-zero status into
/// `DispatchError::Backend`.
#[macro_export]
macro_rules! device_call {
    ($call:literal, $status:expr) => {{
        let status: i32 = $status;
        if status != $crate::backend::STATUS_SUCCESS {
            $crate::critical!("{} failed with status {}", $call, status);
            Err($crate::error::DispatchError::Backend {
                call: $call,
                status,
            })
        } else {
            Ok(())
        }
    }};
}
