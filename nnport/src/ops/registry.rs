use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::backend::Device;
use crate::graph::OpTag;
use crate::types::{DataLayout, Precision};

use super::Kernel;

pub type KernelFactory = fn() -> Box<dyn Kernel>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelKey {
    pub op: OpTag,
    pub device: Device,
    pub precision: Precision,
    pub layout: DataLayout,
}

impl KernelKey {
    pub fn new(op: OpTag, device: Device, precision: Precision, layout: DataLayout) -> Self {
        Self {
            op,
            device,
            precision,
            layout,
        }
    }
}

impl std::fmt::Display for KernelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{:?}",
            self.op, self.device, self.precision, self.layout
        )
    }
}

/// One entry per layout in `layouts`, all sharing `factory`.
pub(crate) fn build_entries(
    op: OpTag,
    device: Device,
    precision: Precision,
    layouts: &[DataLayout],
    factory: KernelFactory,
) -> Vec<(KernelKey, KernelFactory)> {
    layouts
        .iter()
        .map(|layout| (KernelKey::new(op, device, precision, *layout), factory))
        .collect()
}

static KERNELS: Lazy<HashMap<KernelKey, KernelFactory>> = Lazy::new(|| {
    let mut table = HashMap::new();
    let groups: [&[(KernelKey, KernelFactory)]; 6] = [
        super::host::prelu::ENTRIES.as_slice(),
        super::host::pool2d::ENTRIES.as_slice(),
        super::host::stack::ENTRIES.as_slice(),
        super::host::reduce_min::ENTRIES.as_slice(),
        super::host::match_matrix::ENTRIES.as_slice(),
        super::accel::match_matrix_tensor::ENTRIES.as_slice(),
    ];
    for group in groups {
        for (key, factory) in group.iter() {
            if table.insert(*key, *factory).is_some() {
                crate::warning!("kernel {} registered twice", key);
            }
        }
    }
    table
});

/// Create a fresh kernel for `key`, or `None` when nothing is registered.
pub fn lookup_kernel(key: &KernelKey) -> Option<Box<dyn Kernel>> {
    KERNELS.get(key).map(|factory| factory())
}

pub fn is_registered(key: &KernelKey) -> bool {
    KERNELS.contains_key(key)
}

pub fn registered_keys() -> Vec<KernelKey> {
    let mut keys = KERNELS.keys().copied().collect::<Vec<_>>();
    keys.sort_by_key(|key| key.to_string());
    keys
}
