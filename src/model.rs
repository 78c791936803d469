//! Wire and row models for manufacturers and devices.
//!
//! Field names follow the snake_case keys of the remote JSON API, which are
//! also the column names of the local tables.

use serde::{Deserialize, Serialize};

/// A device manufacturer, optionally carrying its devices (as delivered by
/// the remote snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manufacturer {
    /// Row id; assigned by the store on insert, absent on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub short_name: String,
    pub long_name: String,
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// A single device model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Row id; assigned by the store on insert, absent on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub model: String,
    #[serde(default)]
    pub nickname: Option<String>,
    pub display_size_inches: f64,
    pub memory_mb: f64,
    /// Foreign key into the manufacturer table. Absent on the wire, where a
    /// device is nested under its manufacturer instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_id: Option<i64>,
}

/// One row of the read-only device-manufacturer join.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceManufacturer {
    pub device_id: i64,
    pub model: String,
    pub short_name: String,
}

/// Envelope of the remote snapshot endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManufacturersAndDevicesResponse {
    pub manufacturers: Vec<Manufacturer>,
}
