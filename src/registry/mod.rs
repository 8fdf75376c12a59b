pub mod ioreg;

use std::{fmt, io};

use thiserror::Error;
use tracing::{debug, warn};

use crate::record::RawRecord;

pub use ioreg::{IoregRegistry, ParseError};

// Device classes queried from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Accelerator,
    PciDevice,
}

impl DeviceClass {
    // Return the registry class name
    pub fn class_name(&self) -> &'static str {
        match self {
            DeviceClass::Accelerator => "IOAccelerator",
            DeviceClass::PciDevice => "IOPCIDevice",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to run \"{program}\" for class {class}")]
    Spawn {
        program: String,
        class: DeviceClass,
        #[source]
        source: io::Error,
    },
    #[error("\"{program}\" exited with {status} for class {class}: {stderr}")]
    Status {
        program: String,
        class: DeviceClass,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("Failed to parse the {class} registry listing")]
    Parse {
        class: DeviceClass,
        #[source]
        source: ParseError,
    },
}

// Source of raw device registry entries
pub trait DeviceRegistry {
    // Return every registry entry of the given class
    fn enumerate(&self, class: DeviceClass) -> Result<Vec<RawRecord>, RegistryError>;

    // Same as enumerate, a failure is logged and reported as no entries
    fn enumerate_or_empty(&self, class: DeviceClass) -> Vec<RawRecord> {
        self.enumerate(class).unwrap_or_else(|e| {
            let e = anyhow::Error::from(e);

            warn!("Error during {} enumeration: {}", class, e);

            e.chain().skip(1).for_each(|e| {
                debug!("Error chain: {}", e);
            });

            Vec::new()
        })
    }
}
