use candle_core::Device;
use tracing::info;

/// Metal when built with the `metal` feature and a GPU is present, CPU otherwise.
pub fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) { info!(device = "metal", "compute device"); return dev; }
    }
    info!(device = "cpu", "compute device");
    Device::Cpu
}
