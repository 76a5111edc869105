use std::rc::Rc;

use crate::error::DispatchError;

use super::{DeviceBuffer, DeviceDriver, Transfer, STATUS_SUCCESS};

/// A device allocation owned by one kernel. Released through the driver when
/// dropped.
#[derive(Debug)]
pub struct ScratchPad {
    driver: Rc<dyn DeviceDriver>,
    buffer: DeviceBuffer,
    bytes: usize,
}

impl ScratchPad {
    pub fn allocate(driver: &Rc<dyn DeviceDriver>, bytes: usize) -> Result<Self, DispatchError> {
        let (status, buffer) = driver.allocate(bytes);
        if status != STATUS_SUCCESS || buffer.is_null() {
            crate::critical!(
                "{}: allocation of {} bytes failed with status {}",
                driver.name(),
                bytes,
                status
            );
            return Err(DispatchError::Resource { bytes, status });
        }
        Ok(Self {
            driver: Rc::clone(driver),
            buffer,
            bytes,
        })
    }

    /// Allocate and fill from `data` in one step.
    pub fn with_data(driver: &Rc<dyn DeviceDriver>, data: &[u8]) -> Result<Self, DispatchError> {
        let pad = Self::allocate(driver, data.len())?;
        pad.upload(data)?;
        Ok(pad)
    }

    pub fn buffer(&self) -> DeviceBuffer {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    fn check_fit(&self, bytes: usize) -> Result<(), DispatchError> {
        if bytes > self.bytes {
            return Err(DispatchError::Capacity {
                what: "scratch pad bytes",
                required: bytes,
                capacity: self.bytes,
            });
        }
        Ok(())
    }

    pub fn upload(&self, data: &[u8]) -> Result<(), DispatchError> {
        self.check_fit(data.len())?;
        crate::device_call!(
            "memcpy_h2d",
            self.driver.memcpy(Transfer::HostToDevice {
                dst: self.buffer,
                src: data,
            })
        )
    }

    pub fn download(&self, data: &mut [u8]) -> Result<(), DispatchError> {
        self.check_fit(data.len())?;
        crate::device_call!(
            "memcpy_d2h",
            self.driver.memcpy(Transfer::DeviceToHost {
                dst: data,
                src: self.buffer,
            })
        )
    }
}

impl Drop for ScratchPad {
    fn drop(&mut self) {
        let status = self.driver.free(self.buffer);
        if status != STATUS_SUCCESS {
            crate::warning!(
                "{}: freeing buffer {:?} returned status {}",
                self.driver.name(),
                self.buffer,
                status
            );
        }
    }
}
