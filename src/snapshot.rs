use tracing::debug;

use crate::{
    matcher::match_devices,
    metrics::{DeviceMetrics, extract},
    registry::{DeviceClass, DeviceRegistry},
};

// Take a snapshot of the metrics of every accelerator
// that can be correlated with a PCI device
pub fn snapshot(registry: &dyn DeviceRegistry) -> Vec<DeviceMetrics> {
    let accelerators = registry.enumerate_or_empty(DeviceClass::Accelerator);
    let pci_devices = registry.enumerate_or_empty(DeviceClass::PciDevice);

    debug!(
        "Found {} accelerators and {} PCI devices",
        accelerators.len(),
        pci_devices.len()
    );

    let devices = match_devices(accelerators, pci_devices);

    debug!("Correlated {} devices", devices.len());

    devices.iter().map(extract).collect()
}
