//! # unistore
//!
//! A unified, async key-value storage abstraction over mountable drivers:
//! memory, filesystem, an HTTP client/server pair, and an overlay that
//! layers several drivers into one copy-on-write view.
//!
//! ## Core principle
//!
//! **One key space, many backends.** Every operation goes through a single
//! colon-separated key (`users:42:profile`); a [`engine::StorageEngine`]
//! routes each key to whichever [`driver::Driver`] is mounted at the
//! longest matching prefix, so callers never need to know which backend
//! actually holds a value.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │              StorageEngine                  │
//! │   mount table: longest-prefix routing       │
//! └───────┬──────────────┬──────────────┬───────┘
//!         │              │              │
//!    MemoryDriver   FileSystemDriver  ClientDriver
//!                                        (HTTP)
//! ```
//!
//! [`prefixed::PrefixedView`] layers a namespace on top of an engine
//! without a new mount; [`http`] exposes an engine over the wire and
//! consumes one back via [`driver::ClientDriver`].

pub mod driver;
pub mod engine;
pub mod error;
pub mod http;
pub mod key;
pub mod prefixed;
pub mod serialize;
pub mod value;

pub use driver::{Capabilities, ChangeKind, ClientDriver, Driver, FileSystemDriver, MemoryDriver, OverlayDriver, Options};
pub use engine::{EngineCallback, EngineUnwatch, MountTable, Snapshot, StorageEngine};
pub use error::{Result, StoreError};
pub use prefixed::PrefixedView;
pub use value::{Meta, Value};

/// Protocol version of the HTTP wire format (spec §4.8).
pub const VERSION: &str = "1.0.0";

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn core_types_exported() {
        let _ = std::any::type_name::<StorageEngine>();
        let _ = std::any::type_name::<MemoryDriver>();
        let _ = std::any::type_name::<FileSystemDriver>();
        let _ = std::any::type_name::<ClientDriver>();
        let _ = std::any::type_name::<OverlayDriver>();
        let _ = std::any::type_name::<PrefixedView>();
        let _ = std::any::type_name::<StoreError>();
    }

    #[tokio::test]
    async fn engine_is_usable_from_the_crate_root() {
        let engine = StorageEngine::new(Arc::new(MemoryDriver::new()));
        engine
            .set("greeting", &Value::String("hi".into()), &Options::default())
            .await
            .unwrap();
        assert_eq!(
            engine.get("greeting", &Options::default()).await.unwrap(),
            Some(Value::String("hi".into()))
        );
    }

    #[test]
    fn version_is_semver_shaped() {
        assert_eq!(VERSION.split('.').count(), 3);
    }
}
