//! Column names shared by the store, the reconciler, and callers.
//!
//! Callers address rows through [`crate::uri::ResourceUri`]; the constants
//! here name the columns they may read and write on each collection.

pub mod device {
    pub const TABLE: &str = "device";

    pub const ID: &str = "id";
    pub const MODEL: &str = "model";
    pub const NICKNAME: &str = "nickname";
    pub const DISPLAY_SIZE_INCHES: &str = "display_size_inches";
    pub const MEMORY_MB: &str = "memory_mb";
    pub const MANUFACTURER_ID: &str = "manufacturer_id";
}

pub mod manufacturer {
    pub const TABLE: &str = "manufacturer";

    pub const ID: &str = "id";
    pub const SHORT_NAME: &str = "short_name";
    pub const LONG_NAME: &str = "long_name";
}

/// Projection columns of the read-only device-manufacturer join.
pub mod device_manufacturer {
    pub const DEVICE_ID: &str = "device_id";
    pub const MODEL: &str = "model";
    pub const SHORT_NAME: &str = "short_name";
    pub const MANUFACTURER_ID: &str = "manufacturer_id";
}
