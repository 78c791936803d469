//! Resource URI - addresses for rows and collections in the store
//!
//! Format: `content://<authority>/<collection>[/<id>]`
//!
//! Examples:
//! - `content://devicedb/manufacturer` (all manufacturers)
//! - `content://devicedb/device/42` (one device row)
//! - `content://devicedb/device-manufacturer` (read-only join)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Authority under which the store publishes its collections.
pub const AUTHORITY: &str = "devicedb";

const SCHEME_PREFIX: &str = "content://";

/// The collections addressable through the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Device,
    Manufacturer,
    /// Derived join of device and manufacturer. Read-only.
    DeviceManufacturer,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Device => "device",
            Collection::Manufacturer => "manufacturer",
            Collection::DeviceManufacturer => "device-manufacturer",
        }
    }

    /// Backing table, or `None` for the derived join.
    pub fn table(&self) -> Option<&'static str> {
        match self {
            Collection::Device => Some("device"),
            Collection::Manufacturer => Some("manufacturer"),
            Collection::DeviceManufacturer => None,
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, Collection::DeviceManufacturer)
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "device" => Ok(Collection::Device),
            "manufacturer" => Ok(Collection::Manufacturer),
            "device-manufacturer" => Ok(Collection::DeviceManufacturer),
            other => Err(Error::InvalidUri(format!("Unknown collection: {}", other))),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Address of a collection or a single row within it.
///
/// The URI is the key used for CRUD dispatch and for change notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceUri {
    /// Provider authority
    pub authority: String,
    /// Addressed collection
    pub collection: Collection,
    /// Row id; `None` addresses the whole collection
    pub id: Option<i64>,
}

impl ResourceUri {
    /// Address a whole collection under the default authority.
    pub fn collection(collection: Collection) -> Self {
        Self {
            authority: AUTHORITY.to_string(),
            collection,
            id: None,
        }
    }

    /// Address a single row under the default authority.
    pub fn item(collection: Collection, id: i64) -> Self {
        Self {
            authority: AUTHORITY.to_string(),
            collection,
            id: Some(id),
        }
    }

    /// Derive the single-row URI for `id` within this URI's collection.
    pub fn with_id(&self, id: i64) -> Self {
        Self {
            authority: self.authority.clone(),
            collection: self.collection,
            id: Some(id),
        }
    }

    /// Derive the collection-level URI for this URI's collection.
    pub fn to_collection(&self) -> Self {
        Self {
            authority: self.authority.clone(),
            collection: self.collection,
            id: None,
        }
    }

    pub fn is_item(&self) -> bool {
        self.id.is_some()
    }

    /// Parse a URI string.
    ///
    /// Expected format: `content://<authority>/<collection>[/<id>]`
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix(SCHEME_PREFIX)
            .ok_or_else(|| Error::InvalidUri(format!("URI must start with {}", SCHEME_PREFIX)))?;

        let (authority, path) = rest
            .split_once('/')
            .ok_or_else(|| Error::InvalidUri("URI must contain authority/collection".to_string()))?;

        if authority.is_empty() {
            return Err(Error::InvalidUri("Authority must not be empty".to_string()));
        }

        let (collection_str, id) = match path.split_once('/') {
            Some((collection, id_str)) => {
                let id: i64 = id_str
                    .parse()
                    .map_err(|_| Error::InvalidUri(format!("Invalid row id: {}", id_str)))?;
                (collection, Some(id))
            }
            None => (path, None),
        };

        let collection = Collection::from_str(collection_str)?;

        Ok(Self {
            authority: authority.to_string(),
            collection,
            id,
        })
    }

    /// Convert to URI string
    pub fn to_uri_string(&self) -> String {
        match self.id {
            Some(id) => format!(
                "{}{}/{}/{}",
                SCHEME_PREFIX,
                self.authority,
                self.collection.as_str(),
                id
            ),
            None => format!(
                "{}{}/{}",
                SCHEME_PREFIX,
                self.authority,
                self.collection.as_str()
            ),
        }
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri_string())
    }
}

impl FromStr for ResourceUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for ResourceUri {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_uri_string())
    }
}

impl<'de> Deserialize<'de> for ResourceUri {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ResourceUri::parse(&s).map_err(serde::de::Error::custom)
    }
}
