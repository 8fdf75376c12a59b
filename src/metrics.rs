use crate::{matcher::CorrelatedDevice, record::RawRecord};

const MIB: i64 = 1 << 20;

// Registry reports hardwareWaitTime in nanoseconds, one
// utilization percent point every 10 ms
const WAIT_TIME_PER_PERCENT: i64 = 10_000_000;

// Normalized metrics of a single device, all memory values are in bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceMetrics {
    pub name: Option<String>,
    pub used_vram_bytes: Option<i64>,
    pub total_vram_bytes: Option<i64>,
    pub utilization_percent: Option<i64>,
}

// Derive the device metrics from the accelerator and PCI entries.
// Every field is resolved from an ordered list of candidate
// properties, the first one present wins
pub fn extract(device: &CorrelatedDevice) -> DeviceMetrics {
    let accelerator = device.accelerator();
    let pci_device = device.pci_device();

    let statistics = accelerator.get_record("PerformanceStatistics");

    let total_vram_bytes = total_vram_bytes(accelerator, pci_device);

    // Usage is meaningless without a total
    let used_vram_bytes = total_vram_bytes
        .and_then(|total| statistics.map(|stats| used_vram_bytes(stats, total)));

    DeviceMetrics {
        name: name(accelerator, pci_device),
        used_vram_bytes,
        total_vram_bytes,
        utilization_percent: statistics.and_then(utilization_percent),
    }
}

fn name(accelerator: &RawRecord, pci_device: &RawRecord) -> Option<String> {
    pci_device
        .get_data("model")
        .and_then(|model| std::str::from_utf8(model).ok())
        .or_else(|| accelerator.get_str("IOGLBundleName"))
        // Model strings are stored NUL terminated
        .map(|name| name.split('\0').next().unwrap_or(name).to_string())
}

fn total_vram_bytes(accelerator: &RawRecord, pci_device: &RawRecord) -> Option<i64> {
    accelerator
        .get_integer("VRAM,totalMB")
        .or_else(|| pci_device.get_integer("VRAM,totalMB"))
        .map(|total_mb| total_mb.saturating_mul(MIB))
        .or_else(|| pci_device.get_integer("ATY,memsize"))
}

// A statistics record without any usage counter counts as nothing used
fn used_vram_bytes(statistics: &RawRecord, total: i64) -> i64 {
    statistics
        .get_integer("vramUsedBytes")
        .or_else(|| {
            statistics
                .get_integer("vramFreeBytes")
                .map(|free| total.saturating_sub(free))
        })
        .or_else(|| statistics.get_integer("gartUsedBytes"))
        .or_else(|| {
            statistics
                .get_integer("gartFreeBytes")
                .map(|free| total.saturating_sub(free))
        })
        .unwrap_or(0)
}

fn utilization_percent(statistics: &RawRecord) -> Option<i64> {
    statistics
        .get_integer("Device Utilization %")
        .or_else(|| {
            statistics
                .get_integer("hardwareWaitTime")
                .map(|wait_time| (wait_time / WAIT_TIME_PER_PERCENT).clamp(0, 100))
        })
}
