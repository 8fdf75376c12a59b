use tracing::{debug, trace};

use crate::record::RawRecord;

// Value used for a vendor or device ID that can't be read from the PCI entry
pub const UNRESOLVED_ID: u32 = 0xFFFF;

// An accelerator entry paired with the PCI entry that
// is believed to describe the same physical device
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedDevice {
    accelerator: RawRecord,
    pci_device: RawRecord,
}

impl CorrelatedDevice {
    pub(crate) fn new(accelerator: RawRecord, pci_device: RawRecord) -> Self {
        Self {
            accelerator,
            pci_device,
        }
    }

    pub fn accelerator(&self) -> &RawRecord {
        &self.accelerator
    }

    pub fn pci_device(&self) -> &RawRecord {
        &self.pci_device
    }
}

// Pair every accelerator with the first still unclaimed PCI device that
// matches it. Each PCI device is used at most once, accelerators without
// a match are dropped and the output keeps the accelerators order
pub fn match_devices(
    accelerators: Vec<RawRecord>,
    pci_devices: Vec<RawRecord>,
) -> Vec<CorrelatedDevice> {
    let mut remaining = pci_devices;
    let mut devices = Vec::with_capacity(accelerators.len().min(remaining.len()));

    for accelerator in accelerators {
        let Some(index) = remaining
            .iter()
            .position(|pci_device| devices_match(&accelerator, pci_device))
        else {
            debug!(
                "No PCI device matches accelerator \"{}\"",
                accelerator_label(&accelerator)
            );

            continue;
        };

        let pci_device = remaining.remove(index);

        debug!(
            "Accelerator \"{}\" matched PCI device \"{}\"",
            accelerator_label(&accelerator),
            pci_device.get_str("IOName").unwrap_or("<unnamed>")
        );

        devices.push(CorrelatedDevice::new(accelerator, pci_device));
    }

    devices
}

// Decide whether the accelerator and the PCI device describe the same
// hardware by looking for the PCI IDs, in hexadecimal, inside the
// accelerator PCI match string
pub fn devices_match(accelerator: &RawRecord, pci_device: &RawRecord) -> bool {
    let vendor_id = read_id(pci_device, "vendor-id");
    let device_id = read_id(pci_device, "device-id");

    let Some(pci_match) = accelerator
        .get_str("IOPCIMatch")
        .or_else(|| accelerator.get_str("IOPCIPrimaryMatch"))
        .map(str::to_uppercase)
    else {
        return false;
    };

    if vendor_id == UNRESOLVED_ID {
        return false;
    }

    trace!(
        "Matching vendor {:#x} device {:#x} against \"{}\"",
        vendor_id, device_id, pci_match
    );

    if device_id != UNRESOLVED_ID {
        let combo = (device_id << 16) | vendor_id;

        pci_match.contains(&format!("{combo:X}"))
    } else {
        let vendor = format!("{vendor_id:X}");

        pci_match.ends_with(&vendor) || pci_match.contains(&format!("{vendor} "))
    }
}

// Read the first 4 bytes of a PCI ID property in native byte order
fn read_id(pci_device: &RawRecord, key: &str) -> u32 {
    pci_device
        .get_data(key)
        .and_then(|bytes| bytes.get(..4))
        .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
        .map(u32::from_ne_bytes)
        .unwrap_or(UNRESOLVED_ID)
}

fn accelerator_label(accelerator: &RawRecord) -> &str {
    accelerator
        .get_str("IOClass")
        .or_else(|| accelerator.get_str("IOGLBundleName"))
        .unwrap_or("<unnamed>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pci(vendor_id: Option<u32>, device_id: Option<u32>) -> RawRecord {
        let mut record = RawRecord::new();

        if let Some(id) = vendor_id {
            record.insert("vendor-id", id.to_ne_bytes().to_vec());
        }
        if let Some(id) = device_id {
            record.insert("device-id", id.to_ne_bytes().to_vec());
        }

        record
    }

    fn accelerator(pci_match: &str) -> RawRecord {
        RawRecord::new().with("IOPCIMatch", pci_match)
    }

    #[test]
    fn unresolved_vendor_never_matches() {
        let accel = accelerator("0xFFFF1234 1234 FFFF");

        assert!(!devices_match(&accel, &pci(None, Some(0x1234))));
        assert!(!devices_match(&accel, &pci(Some(0xFFFF), Some(0x1234))));
        assert!(!devices_match(&accel, &pci(Some(0xFFFF), None)));
    }

    #[test]
    fn combo_is_device_then_vendor() {
        let pci_device = pci(Some(0xABCD), Some(0x1234));

        assert!(devices_match(&accelerator("0x1234abcd&0xffffffff"), &pci_device));
        assert!(devices_match(&accelerator("1234ABCD"), &pci_device));
        assert!(!devices_match(&accelerator("ABCD1234"), &pci_device));
    }

    #[test]
    fn combo_has_no_zero_padding() {
        // 0x0042 << 16 | 0x1002 is "421002" in hexadecimal
        let pci_device = pci(Some(0x1002), Some(0x0042));

        assert!(devices_match(&accelerator("0x421002"), &pci_device));
        assert!(!devices_match(&accelerator("0x00431002"), &pci_device));
    }

    #[test]
    fn vendor_only_needs_suffix_or_token() {
        let pci_device = pci(Some(0x10DE), None);

        assert!(devices_match(&accelerator("0x000010de"), &pci_device));
        assert!(devices_match(&accelerator("0x10DE 0x1002"), &pci_device));
        assert!(!devices_match(&accelerator("0x10DEFFFF"), &pci_device));
    }

    #[test]
    fn short_id_blob_is_unresolved() {
        let mut pci_device = RawRecord::new().with("vendor-id", vec![0xdeu8, 0x10]);

        assert!(!devices_match(&accelerator("10DE"), &pci_device));

        pci_device.insert("vendor-id", "10de");
        assert!(!devices_match(&accelerator("10DE"), &pci_device));
    }

    #[test]
    fn primary_match_is_the_fallback() {
        let pci_device = pci(Some(0x1002), Some(0x67DF));
        let accel = RawRecord::new().with("IOPCIPrimaryMatch", "0x67DF1002");
        assert!(devices_match(&accel, &pci_device));

        // A non string IOPCIMatch doesn't hide the fallback
        let accel = accel.with("IOPCIMatch", 12i64);
        assert!(devices_match(&accel, &pci_device));

        assert!(!devices_match(&RawRecord::new(), &pci_device));
    }

    #[test]
    fn first_accelerator_claims_the_pci_device() {
        let a = accelerator("0x12341002").with("IOClass", "A");
        let b = accelerator("0x12341002").with("IOClass", "B");
        let p = pci(Some(0x1002), Some(0x1234));

        let devices = match_devices(vec![a.clone(), b], vec![p.clone()]);

        assert_eq!(devices, vec![CorrelatedDevice::new(a, p)]);
    }

    #[test]
    fn output_follows_accelerator_order() {
        let nvidia = accelerator("0x1EB810DE");
        let amd = accelerator("0x73BF1002");
        let unmatched = accelerator("0x00008086");

        let nvidia_pci = pci(Some(0x10DE), Some(0x1EB8));
        let amd_pci = pci(Some(0x1002), Some(0x73BF));
        let other_pci = pci(Some(0x14E4), Some(0x1684));

        let devices = match_devices(
            vec![amd.clone(), unmatched, nvidia.clone()],
            vec![other_pci, nvidia_pci.clone(), amd_pci.clone()],
        );

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].accelerator(), &amd);
        assert_eq!(devices[0].pci_device(), &amd_pci);
        assert_eq!(devices[1].accelerator(), &nvidia);
        assert_eq!(devices[1].pci_device(), &nvidia_pci);
    }

    #[test]
    fn output_is_bounded_by_both_inputs() {
        let accelerators = vec![accelerator("0x10DE"); 4];
        let pci_devices = vec![pci(Some(0x10DE), None); 2];

        let devices = match_devices(accelerators.clone(), pci_devices.clone());
        assert_eq!(devices.len(), 2);

        let devices = match_devices(accelerators[..1].to_vec(), pci_devices);
        assert_eq!(devices.len(), 1);

        assert!(match_devices(accelerators, Vec::new()).is_empty());
    }
}
