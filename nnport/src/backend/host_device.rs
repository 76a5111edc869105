use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::ops::host::match_matrix::{dequantize_fixed_i16, match_matrix_forward, MatchMatrixProblem};
use crate::settings::DeviceSettings;
use crate::tensor::{decode_f32, encode_f32};

use super::{DeviceBuffer, DeviceDriver, MatchMatrixArgs, Transfer, STATUS_SUCCESS};

pub const STATUS_OUT_OF_MEMORY: i32 = -1;
pub const STATUS_INVALID_HANDLE: i32 = -2;
pub const STATUS_INVALID_ARGUMENT: i32 = -3;

/// Counters kept by [`HostDevice`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub allocations: usize,
    pub frees: usize,
    pub host_to_device: usize,
    pub device_to_host: usize,
    pub native_calls: usize,
    pub live_buffers: usize,
    pub live_bytes: usize,
}

#[derive(Debug, Default)]
struct DeviceMemory {
    buffers: HashMap<u64, Vec<u8>>,
    next_handle: u64,
    stats: DeviceStats,
}

/// Accelerator simulated over host memory.
///
/// Allocations are tracked against an optional budget and native calls can be
/// made to fail with a chosen status. Uses unsynchronized interior
/// mutability, so it must stay on one thread.
#[derive(Debug)]
pub struct HostDevice {
    settings: DeviceSettings,
    memory: RefCell<DeviceMemory>,
    fault: Cell<Option<i32>>,
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new(DeviceSettings::default())
    }
}

impl HostDevice {
    pub fn new(settings: DeviceSettings) -> Self {
        Self {
            settings,
            memory: RefCell::new(DeviceMemory {
                next_handle: 1,
                ..DeviceMemory::default()
            }),
            fault: Cell::new(None),
        }
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    /// Make every following native call return `status` until cleared with
    /// `None`.
    pub fn inject_fault(&self, status: Option<i32>) {
        self.fault.set(status);
    }

    pub fn stats(&self) -> DeviceStats {
        self.memory.borrow().stats
    }

    /// Copy of a live buffer's contents.
    pub fn read_buffer(&self, buffer: DeviceBuffer) -> Option<Vec<u8>> {
        self.memory.borrow().buffers.get(&buffer.0).cloned()
    }

    fn read_f32(&self, buffer: DeviceBuffer) -> Option<Vec<f32>> {
        self.memory
            .borrow()
            .buffers
            .get(&buffer.0)
            .map(|bytes| decode_f32(bytes))
    }

    fn read_offsets(&self, buffer: DeviceBuffer, len: usize) -> Option<Vec<usize>> {
        let memory = self.memory.borrow();
        let bytes = memory.buffers.get(&buffer.0)?;
        if bytes.len() < len * 4 {
            return None;
        }
        bytes[..len * 4]
            .chunks_exact(4)
            .map(|chunk| usize::try_from(bytemuck::pod_read_unaligned::<i32>(chunk)).ok())
            .collect()
    }

    fn write_f32(&self, buffer: DeviceBuffer, values: &[f32]) -> i32 {
        let mut memory = self.memory.borrow_mut();
        let Some(dst) = memory.buffers.get_mut(&buffer.0) else {
            return STATUS_INVALID_HANDLE;
        };
        let bytes = encode_f32(values);
        if bytes.len() > dst.len() {
            return STATUS_INVALID_ARGUMENT;
        }
        dst[..bytes.len()].copy_from_slice(&bytes);
        STATUS_SUCCESS
    }
}

impl DeviceDriver for HostDevice {
    fn name(&self) -> &'static str {
        "host_device"
    }

    fn allocate(&self, bytes: usize) -> (i32, DeviceBuffer) {
        let mut memory = self.memory.borrow_mut();
        if let Some(budget) = self.settings.memory_budget {
            if memory.stats.live_bytes + bytes > budget {
                crate::dev_trace!(
                    "allocate {} bytes refused: {} of {} bytes in use",
                    bytes,
                    memory.stats.live_bytes,
                    budget
                );
                return (STATUS_OUT_OF_MEMORY, DeviceBuffer::NULL);
            }
        }
        let handle = memory.next_handle;
        memory.next_handle += 1;
        memory.buffers.insert(handle, vec![0; bytes]);
        memory.stats.allocations += 1;
        memory.stats.live_buffers += 1;
        memory.stats.live_bytes += bytes;
        crate::dev_trace!("allocate #{} ({} bytes)", handle, bytes);
        (STATUS_SUCCESS, DeviceBuffer(handle))
    }

    fn free(&self, buffer: DeviceBuffer) -> i32 {
        let mut memory = self.memory.borrow_mut();
        match memory.buffers.remove(&buffer.0) {
            Some(bytes) => {
                memory.stats.frees += 1;
                memory.stats.live_buffers -= 1;
                memory.stats.live_bytes -= bytes.len();
                crate::dev_trace!("free #{} ({} bytes)", buffer.0, bytes.len());
                STATUS_SUCCESS
            }
            None => STATUS_INVALID_HANDLE,
        }
    }

    fn memcpy(&self, transfer: Transfer<'_>) -> i32 {
        let mut guard = self.memory.borrow_mut();
        let memory = &mut *guard;
        let direction = transfer.direction();
        let bytes = transfer.bytes();
        let status = match transfer {
            Transfer::HostToDevice { dst, src } => match memory.buffers.get_mut(&dst.0) {
                None => STATUS_INVALID_HANDLE,
                Some(device) if device.len() < src.len() => STATUS_INVALID_ARGUMENT,
                Some(device) => {
                    device[..src.len()].copy_from_slice(src);
                    memory.stats.host_to_device += 1;
                    STATUS_SUCCESS
                }
            },
            Transfer::DeviceToHost { dst, src } => match memory.buffers.get(&src.0) {
                None => STATUS_INVALID_HANDLE,
                Some(device) if device.len() < dst.len() => STATUS_INVALID_ARGUMENT,
                Some(device) => {
                    dst.copy_from_slice(&device[..dst.len()]);
                    memory.stats.device_to_host += 1;
                    STATUS_SUCCESS
                }
            },
        };
        crate::dev_trace!("memcpy {:?} {} bytes -> status {}", direction, bytes, status);
        status
    }

    fn max_ptr_size(&self) -> usize {
        self.settings.max_ptr_size
    }

    fn max_lod_size(&self) -> usize {
        self.settings.max_lod_size
    }

    fn match_matrix_tensor(&self, args: &MatchMatrixArgs<'_>) -> i32 {
        self.memory.borrow_mut().stats.native_calls += 1;
        if let Some(status) = self.fault.get() {
            crate::dev_trace!("match_matrix_tensor: injected status {}", status);
            return status;
        }
        if args.offset_l.host.len() != args.offset_r.host.len() || args.dim_t == 0 {
            return STATUS_INVALID_ARGUMENT;
        }
        // The device only sees the staged copies of the offsets.
        let (Some(offset_l), Some(offset_r)) = (
            self.read_offsets(args.offset_l.device, args.offset_l.host.len()),
            self.read_offsets(args.offset_r.device, args.offset_r.host.len()),
        ) else {
            return STATUS_INVALID_HANDLE;
        };
        let (Some(x), Some(y), Some(weight_max)) = (
            self.read_f32(args.x),
            self.read_f32(args.y),
            self.read_f32(args.weight_max),
        ) else {
            return STATUS_INVALID_HANDLE;
        };
        let Some(weight_bytes) = self.read_buffer(args.weight) else {
            return STATUS_INVALID_HANDLE;
        };
        let Some(scale) = weight_max.first().copied() else {
            return STATUS_INVALID_ARGUMENT;
        };
        let weight = dequantize_fixed_i16(&weight_bytes, scale);

        let problem = MatchMatrixProblem {
            x: &x,
            y: &y,
            weight: &weight,
            offset_l: &offset_l,
            offset_r: &offset_r,
            dim_in: args.dim_in,
            dim_t: args.dim_t,
            activation: args.activation,
        };
        let result = match match_matrix_forward(&problem) {
            Ok(result) => result,
            Err(err) => {
                crate::dev_trace!("match_matrix_tensor rejected arguments: {}", err);
                return STATUS_INVALID_ARGUMENT;
            }
        };
        let status = self.write_f32(args.out, &result.out);
        if status != STATUS_SUCCESS {
            return status;
        }
        self.write_f32(args.tmp, &result.tmp)
    }
}
