//! DS18B20 one-wire temperature probe
//!
//! Probes are read through the Linux `w1` sysfs interface: every device
//! directory starting with `28-` holds a `w1_slave` file whose first line ends
//! in `YES` when the CRC matched and whose second line carries `t=<millidegrees>`.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::warn;

use super::{Sensor, module_ref};

/// Reading reported when no probe could be read.
pub const SENSOR_READ_FAILED: f64 = -1.0;

const DS18B20_FAMILY: &str = "28-";

#[derive(Debug, Clone)]
pub struct Ds18b20 {
    id: String,
    devices_path: PathBuf,
    settle: Duration,
}

impl Ds18b20 {
    pub fn new(name: &str, devices_path: impl Into<PathBuf>, settle: Duration) -> Self {
        Self {
            id: module_ref("ds18b20", name),
            devices_path: devices_path.into(),
            settle,
        }
    }

    /// Readings of every probe on the bus, in device-id order.
    ///
    /// Waits for the conversion settle delay before reading. Bus errors are logged
    /// and leave the affected probes out.
    pub async fn read_all_celsius(&self) -> Vec<f64> {
        let devices = match self.scan().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!(module = %self.id, "Unable to scan one-wire bus: {e}");
                return Vec::new();
            }
        };
        tokio::time::sleep(self.settle).await;

        let mut readings = Vec::with_capacity(devices.len());
        for device in devices {
            match read_device(&device).await {
                Ok(celsius) => readings.push(celsius),
                Err(e) => warn!(module = %self.id, device = %device.display(), "Unable to read probe: {e}"),
            }
        }
        readings
    }

    /// Reading of the first probe, or `SENSOR_READ_FAILED`.
    ///
    /// Probe order is only stable by device id, so this is meant for a bus with a
    /// single probe.
    pub async fn read_first_celsius(&self) -> (String, f64) {
        let readings = self.read_all_celsius().await;
        let first = readings.first().copied().unwrap_or(SENSOR_READ_FAILED);
        (self.id.clone(), first)
    }

    async fn scan(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.devices_path).await?;
        let mut devices = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry
                .file_name()
                .to_string_lossy()
                .starts_with(DS18B20_FAMILY)
            {
                devices.push(entry.path());
            }
        }
        devices.sort();
        Ok(devices)
    }
}

impl Sensor for Ds18b20 {
    fn module_id(&self) -> &str {
        &self.id
    }

    fn read_primary(&self) -> BoxFuture<'_, (String, f64)> {
        Box::pin(self.read_first_celsius())
    }
}

async fn read_device(device: &Path) -> io::Result<f64> {
    let raw = tokio::fs::read_to_string(device.join("w1_slave")).await?;
    parse_w1_slave(&raw)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "CRC mismatch or no reading"))
}

/// Temperature in degrees Celsius from the contents of a `w1_slave` file.
pub fn parse_w1_slave(raw: &str) -> Option<f64> {
    let mut lines = raw.lines();
    if !lines.next()?.trim_end().ends_with("YES") {
        return None;
    }
    let (_, millidegrees) = lines.next()?.rsplit_once("t=")?;
    let millidegrees: i64 = millidegrees.trim().parse().ok()?;
    Some(millidegrees as f64 / 1000.0)
}
