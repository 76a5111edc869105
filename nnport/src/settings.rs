//! Build-time device limits and their runtime overrides.
//!
//! `build.rs` reads `settings.json` at the workspace root and bakes the limits
//! into `device_config.rs`. [`DeviceSettings`] starts from those constants and
//! can be overridden from a JSON document when a driver is created.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

mod generated {
    include!(concat!(env!("OUT_DIR"), "/device_config.rs"));
}

/// Capacity of a kernel's device-side offset table, in elements.
pub const MAX_LOD_SIZE: usize = generated::MAX_LOD_SIZE;
/// Width that per-tensor maxima are broadcast to before staging.
pub const MAX_PTR_SIZE: usize = generated::MAX_PTR_SIZE;
/// Upper bound on dynamic-shape alternatives carried by one operand.
pub const MAX_DYNAMIC_SHAPES: usize = generated::MAX_DYNAMIC_SHAPES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub max_lod_size: usize,
    pub max_ptr_size: usize,
    /// Total bytes the device may hand out; `None` means unbounded.
    pub memory_budget: Option<usize>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            max_lod_size: MAX_LOD_SIZE,
            max_ptr_size: MAX_PTR_SIZE,
            memory_budget: None,
        }
    }
}

impl DeviceSettings {
    /// Parse settings from either a bare object or the `{"nnport": {"device": ..}}`
    /// layout used by `settings.json`.
    pub fn from_json(contents: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(contents).context("invalid device settings json")?;
        let section = value
            .get("nnport")
            .and_then(|v| v.get("device"))
            .cloned()
            .unwrap_or(value);
        let settings: DeviceSettings =
            serde_json::from_value(section).context("invalid device settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_lod_size < 2 {
            return Err(anyhow!(
                "max_lod_size must hold at least one sequence, got {}",
                self.max_lod_size
            ));
        }
        if self.max_ptr_size == 0 {
            return Err(anyhow!("max_ptr_size must be positive"));
        }
        Ok(())
    }
}
