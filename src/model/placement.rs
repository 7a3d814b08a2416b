//! Module-to-device placement

use std::collections::BTreeMap;

use super::layers::{block_index, is_input_embedding};
use crate::config::{Device, DeviceMap};

/// Module holding the input embeddings
pub const EMBEDDINGS_MODULE: &str = "embeddings";
/// Module holding everything after the last block
pub const HEAD_MODULE: &str = "head";

/// Device assigned to every top-level module
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DevicePlacement {
    modules: BTreeMap<String, Device>,
}

impl DevicePlacement {
    /// Resolve a device directive for a model with `num_blocks` decoder blocks
    ///
    /// Strategies (`auto`, `balanced`, ...) spread modules over the available
    /// accelerators; this build has no accelerator runtime, so they land on CPU.
    /// Explicit devices are assigned as given without checking they exist.
    #[must_use]
    pub fn plan(device_map: &DeviceMap, num_blocks: usize) -> Self {
        let names = std::iter::once(EMBEDDINGS_MODULE.to_string())
            .chain((0..num_blocks).map(block_module))
            .chain(std::iter::once(HEAD_MODULE.to_string()));

        let device = match device_map {
            DeviceMap::Single(device) => *device,
            _ => Device::Cpu,
        };
        let modules = names.map(|name| (name, device)).collect();
        Self { modules }
    }

    /// Module a tensor belongs to
    #[must_use]
    pub fn module_of(tensor: &str) -> String {
        match block_index(tensor) {
            Some(block) => block_module(block),
            None if is_input_embedding(tensor) => EMBEDDINGS_MODULE.to_string(),
            None => HEAD_MODULE.to_string(),
        }
    }

    /// Device of a module
    #[must_use]
    pub fn device_of(&self, module: &str) -> Option<&Device> {
        self.modules.get(module)
    }

    /// Move every module to CPU
    pub fn to_cpu(&mut self) {
        for device in self.modules.values_mut() {
            *device = Device::Cpu;
        }
    }

    /// Whether every module is on CPU
    #[must_use]
    pub fn is_all_cpu(&self) -> bool {
        self.modules.values().all(|d| *d == Device::Cpu)
    }

    /// Number of modules
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether nothing is placed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Module counts per device, e.g. `cpu: 34`
    #[must_use]
    pub fn summary(&self) -> String {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for device in self.modules.values() {
            *counts.entry(device.to_string()).or_insert(0) += 1;
        }
        counts.iter().map(|(d, n)| format!("{d}: {n}")).collect::<Vec<_>>().join(", ")
    }
}

fn block_module(block: usize) -> String {
    format!("layers.{block}")
}
