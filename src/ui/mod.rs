pub mod output;
pub mod table;

pub use output::{error, header, info, success, theme, Theme};
pub use table::{devices_table, manufacturers_table};
