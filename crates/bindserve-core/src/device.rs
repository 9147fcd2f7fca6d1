use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a loaded model runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComputeDevice {
    #[default]
    Cpu,
    Cuda { ordinal: usize },
    Metal { ordinal: usize },
}

impl ComputeDevice {
    pub fn is_accelerator(&self) -> bool {
        !matches!(self, ComputeDevice::Cpu)
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeDevice::Cpu => f.write_str("cpu"),
            ComputeDevice::Cuda { ordinal } => write!(f, "cuda:{ordinal}"),
            ComputeDevice::Metal { ordinal } => write!(f, "metal:{ordinal}"),
        }
    }
}
