use std::str::FromStr;

use anyhow::Result;
use nnport::backend::{Device, DeviceDriver, HostDevice};
use nnport::settings::{MAX_LOD_SIZE, MAX_PTR_SIZE};
use nnport::DeviceSettings;

#[test]
fn settings_device_defaults_follow_build_limits() -> Result<()> {
    let settings = DeviceSettings::default();
    assert_eq!(settings.max_lod_size, MAX_LOD_SIZE);
    assert_eq!(settings.max_ptr_size, MAX_PTR_SIZE);
    assert_eq!(settings.memory_budget, None);
    settings.validate()?;

    let device = HostDevice::default();
    assert_eq!(device.max_lod_size(), MAX_LOD_SIZE);
    assert_eq!(device.max_ptr_size(), MAX_PTR_SIZE);
    Ok(())
}

#[test]
fn settings_device_parse_json() -> Result<()> {
    let nested = DeviceSettings::from_json(
        r#"{"nnport": {"device": {"max_lod_size": 32, "memory_budget": 4096}}}"#,
    )?;
    assert_eq!(nested.max_lod_size, 32);
    assert_eq!(nested.max_ptr_size, MAX_PTR_SIZE);
    assert_eq!(nested.memory_budget, Some(4096));

    let bare = DeviceSettings::from_json(r#"{"max_ptr_size": 2}"#)?;
    assert_eq!(bare.max_ptr_size, 2);
    assert_eq!(bare.max_lod_size, MAX_LOD_SIZE);

    let device = HostDevice::new(bare);
    assert_eq!(device.settings(), &bare);
    assert_eq!(device.max_ptr_size(), 2);
    Ok(())
}

#[test]
fn settings_device_rejects_invalid_values() -> Result<()> {
    assert!(DeviceSettings::from_json("not json").is_err());
    assert!(DeviceSettings::from_json(r#"{"max_lod_size": 1}"#).is_err());
    assert!(DeviceSettings::from_json(r#"{"max_ptr_size": 0}"#).is_err());
    assert!(DeviceSettings::from_json(r#"{"max_lod_size": "many"}"#).is_err());
    Ok(())
}

#[test]
fn settings_device_names() -> Result<()> {
    assert_eq!(Device::from_str("host")?, Device::Host);
    assert_eq!(Device::from_str("CPU")?, Device::Host);
    assert_eq!(Device::from_str(" xpu ")?, Device::Accel);
    assert_eq!(Device::from_str("accel")?, Device::Accel);
    assert!(Device::from_str("gpu").is_err());
    assert_eq!(Device::Accel.to_string(), "accel");
    Ok(())
}
