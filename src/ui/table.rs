use crate::model::{DeviceManufacturer, Manufacturer};
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ManufacturerRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Short Name")]
    short_name: String,
    #[tabled(rename = "Long Name")]
    long_name: String,
}

pub fn manufacturers_table(manufacturers: &[Manufacturer]) -> String {
    if manufacturers.is_empty() {
        return String::new();
    }

    let rows: Vec<ManufacturerRow> = manufacturers
        .iter()
        .map(|manufacturer| ManufacturerRow {
            id: manufacturer
                .id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            short_name: manufacturer.short_name.clone(),
            long_name: manufacturer.long_name.clone(),
        })
        .collect();

    Table::new(&rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Id")]
    device_id: i64,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Manufacturer")]
    manufacturer: String,
}

pub fn devices_table(rows: &[DeviceManufacturer]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let rows: Vec<DeviceRow> = rows
        .iter()
        .map(|row| DeviceRow {
            device_id: row.device_id,
            model: row.model.clone(),
            manufacturer: row.short_name.clone(),
        })
        .collect();

    Table::new(&rows).with(Style::rounded()).to_string()
}
