//! The HTTP protocol that exposes a `StorageEngine` over the wire (spec
//! §4.8) and the [`ClientDriver`](crate::driver::ClientDriver) that
//! consumes it from the other side.

mod server;
mod wire;

pub use server::{build_router, AppState, AuthHook, PathResolver};
pub use wire::{classify_path, AccessMode, PathKind, RAW_CONTENT_TYPE, TTL_HEADER};
