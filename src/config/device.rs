//! Device placement directives
//!
//! Parses the `--device_map` string into a typed directive. The set of
//! accepted spellings follows the Hugging Face loaders.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ConfigError;

/// A single compute device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Device {
    /// Host memory
    #[default]
    Cpu,
    /// CUDA accelerator with ordinal
    Cuda(usize),
    /// Apple Metal Performance Shaders
    Mps,
    /// Offloaded to disk
    Disk,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(idx) => write!(f, "cuda:{idx}"),
            Self::Mps => write!(f, "mps"),
            Self::Disk => write!(f, "disk"),
        }
    }
}

/// Device placement directive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeviceMap {
    /// Let the loader decide (same as balanced)
    #[default]
    Auto,
    /// Spread blocks evenly over available accelerators
    Balanced,
    /// Balanced, keeping the first accelerator as light as possible
    BalancedLow0,
    /// Fill accelerators one after another
    Sequential,
    /// Everything on one device
    Single(Device),
}

impl DeviceMap {
    /// Whether the directive names a strategy rather than a device
    #[must_use]
    pub fn is_strategy(&self) -> bool {
        !matches!(self, Self::Single(_))
    }
}

impl std::str::FromStr for DeviceMap {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "auto" => Ok(Self::Auto),
            "balanced" => Ok(Self::Balanced),
            "balanced_low_0" => Ok(Self::BalancedLow0),
            "sequential" => Ok(Self::Sequential),
            "cpu" => Ok(Self::Single(Device::Cpu)),
            "mps" => Ok(Self::Single(Device::Mps)),
            "disk" => Ok(Self::Single(Device::Disk)),
            "cuda" => Ok(Self::Single(Device::Cuda(0))),
            other => {
                let ordinal = other.strip_prefix("cuda:").unwrap_or(other);
                ordinal
                    .parse::<usize>()
                    .map(|idx| Self::Single(Device::Cuda(idx)))
                    .map_err(|_| ConfigError::InvalidDeviceMap(s.to_string()))
            }
        }
    }
}

impl fmt::Display for DeviceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Balanced => write!(f, "balanced"),
            Self::BalancedLow0 => write!(f, "balanced_low_0"),
            Self::Sequential => write!(f, "sequential"),
            Self::Single(device) => write!(f, "{device}"),
        }
    }
}
