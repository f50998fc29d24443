//! Wireless link contract
//!
//! The controller never talks to a radio directly. A [`LinkConnector`]
//! discovers and connects one fixture at a time and hands back a
//! [`LinkChannel`] that accepts color and command writes. The wire format
//! is fixed by the fixture firmware: three raw bytes for a color, ASCII text
//! for a command.

pub mod loopback;

use futures::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;

/// GATT service exposed by the fixture
pub const SERVICE_UUID: &str = "12345678-1234-1234-1234-123456789abc";
/// Characteristic accepting `[r, g, b]` writes
pub const COLOR_CHARACTERISTIC_UUID: &str = "12345678-1234-1234-1234-123456789abd";
/// Characteristic accepting text commands
pub const CONTROL_CHARACTERISTIC_UUID: &str = "12345678-1234-1234-1234-123456789abe";

/// Errors reported by a link
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("No matching device found")]
    NotFound,

    #[error("Access denied: {0}")]
    Denied(String),

    #[error("GATT Server is disconnected")]
    Disconnected,

    #[error("Write failed: {0}")]
    Write(String),
}

/// Called once when the link drops
pub type DisconnectCallback = Box<dyn FnOnce() + Send + 'static>;

/// An established connection to one fixture
pub trait LinkChannel: Send + Sync {
    /// Name the device advertised during discovery
    fn advertised_name(&self) -> String;

    fn is_connected(&self) -> bool;

    /// Write a color to the color characteristic
    fn write_color(&self, rgb: [u8; 3]) -> BoxFuture<'_, Result<(), LinkError>>;

    /// Write an ASCII command to the control characteristic
    fn write_command<'a>(&'a self, command: &'a [u8]) -> BoxFuture<'a, Result<(), LinkError>>;

    /// Register a callback fired when the link drops, for whatever reason
    fn on_disconnected(&self, callback: DisconnectCallback);

    /// Close the link
    fn disconnect(&self) -> BoxFuture<'_, ()>;
}

/// Shared handle to a connected link
pub type LinkHandle = Arc<dyn LinkChannel>;

/// Discovers and connects fixtures
pub trait LinkConnector: Send + Sync {
    /// Connect the first device accepted by `filter`
    fn connect<'a>(
        &'a self,
        filter: &'a DiscoveryFilter,
    ) -> BoxFuture<'a, Result<LinkHandle, LinkError>>;
}

/// Which advertised devices count as fixtures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFilter {
    pub name_prefix: String,
    pub exact_name: String,
    pub service_uuid: &'static str,
    pub color_characteristic_uuid: &'static str,
    pub control_characteristic_uuid: &'static str,
}

impl Default for DiscoveryFilter {
    fn default() -> Self {
        Self {
            name_prefix: crate::fixture::NAME_PREFIX.to_string(),
            exact_name: crate::fixture::LEGACY_NAME.to_string(),
            service_uuid: SERVICE_UUID,
            color_characteristic_uuid: COLOR_CHARACTERISTIC_UUID,
            control_characteristic_uuid: CONTROL_CHARACTERISTIC_UUID,
        }
    }
}

impl DiscoveryFilter {
    /// Whether an advertised name passes the filter
    pub fn matches(&self, advertised_name: &str) -> bool {
        advertised_name.starts_with(&self.name_prefix) || advertised_name == self.exact_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        let filter = DiscoveryFilter::default();
        assert!(filter.matches("Colorlight-3"));
        assert!(filter.matches("Colorlight"));
        assert!(!filter.matches("Colorlights"));
        assert!(!filter.matches("Lamp Colorlight-3"));
        assert_eq!(filter.service_uuid, SERVICE_UUID);
    }

    #[test]
    fn test_disconnected_message() {
        assert_eq!(
            LinkError::Disconnected.to_string(),
            "GATT Server is disconnected"
        );
    }
}
