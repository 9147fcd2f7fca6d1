use bindserve_core::ComputeDevice;
use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::{Device, DeviceLocation};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Which device the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// CUDA, then Metal, then CPU.
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

/// Resolve a preference into a live candle device.
///
/// `Auto` never fails. An explicit accelerator that cannot be opened falls
/// back to CPU only when `allow_fallback` is set.
pub fn select_device(
    preference: DevicePreference,
    ordinal: usize,
    allow_fallback: bool,
) -> Result<Device, ModelError> {
    match preference {
        DevicePreference::Cpu => Ok(Device::Cpu),
        DevicePreference::Auto => {
            if cuda_is_available() {
                match Device::new_cuda(ordinal) {
                    Ok(device) => return Ok(device),
                    Err(e) => tracing::warn!(error = %e, ordinal, "CUDA reported available but failed to open"),
                }
            }
            if metal_is_available() {
                match Device::new_metal(ordinal) {
                    Ok(device) => return Ok(device),
                    Err(e) => tracing::warn!(error = %e, ordinal, "Metal reported available but failed to open"),
                }
            }
            tracing::warn!("No accelerator available, falling back to CPU");
            Ok(Device::Cpu)
        }
        DevicePreference::Cuda | DevicePreference::Metal => {
            let opened = if preference == DevicePreference::Cuda {
                Device::new_cuda(ordinal)
            } else {
                Device::new_metal(ordinal)
            };
            match opened {
                Ok(device) => Ok(device),
                Err(e) if allow_fallback => {
                    tracing::warn!(
                        requested = ?preference,
                        ordinal,
                        error = %e,
                        "Requested accelerator unavailable, falling back to CPU"
                    );
                    Ok(Device::Cpu)
                }
                Err(e) => Err(ModelError::DeviceUnavailable {
                    requested: format!("{preference:?}:{ordinal}").to_lowercase(),
                    reason: e.to_string(),
                }),
            }
        }
    }
}

/// The serving-facing description of a candle device.
pub fn compute_device(device: &Device) -> ComputeDevice {
    match device.location() {
        DeviceLocation::Cpu => ComputeDevice::Cpu,
        DeviceLocation::Cuda { gpu_id } => ComputeDevice::Cuda { ordinal: gpu_id },
        DeviceLocation::Metal { gpu_id } => ComputeDevice::Metal { ordinal: gpu_id },
    }
}
