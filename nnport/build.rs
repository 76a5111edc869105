use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_LOD_SIZE: u64 = 256;
const DEFAULT_MAX_PTR_SIZE: u64 = 6;
const DEFAULT_MAX_DYNAMIC_SHAPES: u64 = 8;

struct DeviceConfig {
    max_lod_size: u64,
    max_ptr_size: u64,
    max_dynamic_shapes: u64,
}

fn main() {
    if let Err(err) = apply_settings() {
        eprintln!("build.rs: failed to apply settings: {err}");
        if let Err(write_err) = write_rust_config(&default_config()) {
            eprintln!("build.rs: failed to write default device config: {write_err}");
        }
    }
}

fn default_config() -> DeviceConfig {
    DeviceConfig {
        max_lod_size: DEFAULT_MAX_LOD_SIZE,
        max_ptr_size: DEFAULT_MAX_PTR_SIZE,
        max_dynamic_shapes: DEFAULT_MAX_DYNAMIC_SHAPES,
    }
}

fn apply_settings() -> Result<(), Box<dyn std::error::Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let settings_path = manifest_dir.join("../settings.json");
    println!("cargo:rerun-if-changed={}", settings_path.display());
    let config = read_settings(&settings_path).unwrap_or_else(default_config);
    write_rust_config(&config)?;
    Ok(())
}

fn read_settings(path: &Path) -> Option<DeviceConfig> {
    let contents = fs::read_to_string(path).ok()?;
    let value: serde_json::Value = serde_json::from_str(&contents).ok()?;
    let root = value.get("nnport")?;
    let device = root.get("device");
    let graph = root.get("graph");
    let read = |section: Option<&serde_json::Value>, key: &str, default: u64| {
        section
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_u64())
            .filter(|v| *v > 0)
            .unwrap_or(default)
    };
    Some(DeviceConfig {
        max_lod_size: read(device, "max_lod_size", DEFAULT_MAX_LOD_SIZE),
        max_ptr_size: read(device, "max_ptr_size", DEFAULT_MAX_PTR_SIZE),
        max_dynamic_shapes: read(graph, "max_dynamic_shapes", DEFAULT_MAX_DYNAMIC_SHAPES),
    })
}

fn write_rust_config(config: &DeviceConfig) -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let out_file = out_dir.join("device_config.rs");
    let contents = format!(
        "pub const MAX_LOD_SIZE: usize = {};\npub const MAX_PTR_SIZE: usize = {};\npub const MAX_DYNAMIC_SHAPES: usize = {};\n",
        config.max_lod_size, config.max_ptr_size, config.max_dynamic_shapes
    );
    fs::write(out_file, contents)?;
    Ok(())
}
