use std::fmt::{self, Write};

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use thiserror::Error;

use crate::metrics::DeviceMetrics;

const TABLE_WIDTH: usize = 80;
const TITLE: &str = "rusty-gpu";
const UNKNOWN_DEVICE: &str = "<unknown device>";

// Names this long or longer are shortened in the table
const NAME_SHORTEN_AT: usize = 31;
const NAME_KEPT_CHARS: usize = 28;
const NAME_WIDTH: usize = 32;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to encode the report as JSON")]
    Encode(#[from] serde_json::Error),
}

// JSON entry of a single device
#[derive(Debug, Serialize)]
pub struct DeviceEntry<'a> {
    name: Option<&'a str>,
    #[serde(rename = "usedVRAMBytes")]
    used_vram_bytes: Option<i64>,
    #[serde(rename = "totalVRAMByte")]
    total_vram_bytes: Option<i64>,
    #[serde(rename = "deviceUtilizationPercent")]
    utilization_percent: Option<i64>,
}

impl<'a> From<&'a DeviceMetrics> for DeviceEntry<'a> {
    fn from(metrics: &'a DeviceMetrics) -> Self {
        Self {
            name: metrics.name.as_deref(),
            used_vram_bytes: metrics.used_vram_bytes,
            total_vram_bytes: metrics.total_vram_bytes,
            utilization_percent: metrics.utilization_percent,
        }
    }
}

// Machine readable report, the timestamp is in seconds since the Unix epoch
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    devices: Vec<DeviceEntry<'a>>,
    timestamp: i64,
}

impl<'a> Report<'a> {
    pub fn new(devices: &'a [DeviceMetrics], timestamp: i64) -> Self {
        Self {
            devices: devices.iter().map(DeviceEntry::from).collect(),
            timestamp,
        }
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string(self)?)
    }
}

// Render the devices as an 80 columns wide text table
pub fn render_table<Tz>(devices: &[DeviceMetrics], generated_at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let separator = "-".repeat(TABLE_WIDTH);
    let date = generated_at
        .format("%B %-d, %Y at %-I:%M:%S %p %Z")
        .to_string();

    let mut table = String::new();

    // Writing to a String never fails
    let _ = writeln!(table, "{separator}");
    let _ = writeln!(
        table,
        "| {TITLE} {} |",
        pad_left(&date, TABLE_WIDTH - TITLE.len() - 5)
    );
    let _ = writeln!(table, "{separator}");
    let _ = writeln!(
        table,
        "{}{}|",
        pad_right("| ID | Name", 39),
        pad_right("|          VRAM (used/total) | GPU Util ", 40)
    );
    let _ = writeln!(table, "{separator}");

    for (index, device) in devices.iter().enumerate() {
        let _ = writeln!(table, "{}", render_row(index, device));
        let _ = writeln!(table, "{separator}");
    }

    table
}

fn render_row(index: usize, device: &DeviceMetrics) -> String {
    let mut name = device
        .name
        .clone()
        .unwrap_or_else(|| UNKNOWN_DEVICE.to_string());

    if name.chars().count() >= NAME_SHORTEN_AT {
        name = name.chars().take(NAME_KEPT_CHARS).collect::<String>() + "...";
    }

    // Memory is shown in MiB, missing values as -1
    let used = device.used_vram_bytes.map_or(-1, |bytes| bytes >> 20);
    let total = device.total_vram_bytes.map_or(-1, |bytes| bytes >> 20);
    let utilization = device.utilization_percent.unwrap_or(-1);

    format!(
        "|{} | {}|{} |{} |",
        pad_left(&index.to_string(), 3),
        pad_right(&name, NAME_WIDTH),
        pad_left(&format!(" {used} MiB / {total} MiB"), 27),
        pad_left(&format!(" {utilization} %"), 9)
    )
}

// Right align the text in the given width, keeping
// only its last characters if it doesn't fit
fn pad_left(text: &str, width: usize) -> String {
    let count = text.chars().count();

    if count > width {
        text.chars().skip(count - width).collect()
    } else {
        format!("{}{text}", " ".repeat(width - count))
    }
}

// Left align the text in the given width, keeping
// only its first characters if it doesn't fit
fn pad_right(text: &str, width: usize) -> String {
    let count = text.chars().count();

    if count > width {
        text.chars().take(width).collect()
    } else {
        format!("{text}{}", " ".repeat(width - count))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn radeon() -> DeviceMetrics {
        DeviceMetrics {
            name: Some("AMD Radeon Pro 5500M".to_string()),
            used_vram_bytes: Some(1 << 30),
            total_vram_bytes: Some(8 << 30),
            utilization_percent: Some(7),
        }
    }

    #[test]
    fn json_keys_and_nulls() {
        let devices = vec![radeon(), DeviceMetrics::default()];
        let json = Report::new(&devices, 1_760_000_000)
            .to_json()
            .expect("report encodes");

        assert_eq!(
            json,
            "{\"devices\":[\
             {\"name\":\"AMD Radeon Pro 5500M\",\"usedVRAMBytes\":1073741824,\
             \"totalVRAMByte\":8589934592,\"deviceUtilizationPercent\":7},\
             {\"name\":null,\"usedVRAMBytes\":null,\
             \"totalVRAMByte\":null,\"deviceUtilizationPercent\":null}],\
             \"timestamp\":1760000000}"
        );
    }

    #[test]
    fn table_layout() {
        let generated_at = Utc
            .with_ymd_and_hms(2026, 10, 19, 15, 4, 5)
            .single()
            .expect("valid date");

        let table = render_table(&[radeon()], &generated_at);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 7);
        assert!(lines.iter().all(|line| line.chars().count() == TABLE_WIDTH));
        assert!(lines[1].starts_with("| rusty-gpu "));
        assert!(lines[1].ends_with("October 19, 2026 at 3:04:05 PM UTC |"));
        assert_eq!(
            lines[3],
            format!(
                "| ID | Name{}|          VRAM (used/total) | GPU Util |",
                " ".repeat(28)
            )
        );
        assert_eq!(
            lines[5],
            format!(
                "|  0 | AMD Radeon Pro 5500M{}|{}1024 MiB / 8192 MiB |{}7 % |",
                " ".repeat(12),
                " ".repeat(8),
                " ".repeat(6)
            )
        );
    }

    #[test]
    fn missing_values_render_as_minus_one() {
        let row = render_row(3, &DeviceMetrics::default());

        assert_eq!(
            row,
            format!(
                "|  3 | <unknown device>{}|{}-1 MiB / -1 MiB |{}-1 % |",
                " ".repeat(16),
                " ".repeat(12),
                " ".repeat(5)
            )
        );
    }

    #[test]
    fn long_names_are_shortened() {
        let device = DeviceMetrics {
            name: Some("NVIDIA GeForce GTX 1080 Ti Founders Edition".to_string()),
            ..DeviceMetrics::default()
        };

        let row = render_row(0, &device);
        assert!(row.starts_with("|  0 | NVIDIA GeForce GTX 1080 Ti F... |"));

        // 30 characters still fit
        let device = DeviceMetrics {
            name: Some("a".repeat(30)),
            ..DeviceMetrics::default()
        };
        let row = render_row(0, &device);
        assert!(row.starts_with(&format!("|  0 | {}  |", "a".repeat(30))));
    }
}
