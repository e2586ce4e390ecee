//! The overlay driver (spec §4.5): composes ordered layers into one
//! read/write surface, masking lower layers with tombstones.

use super::{Driver, Options};
use crate::error::{Result, StoreError};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Marker value written to the top layer by `remove`, so a subsequent `get`
/// or `has` knows the key is gone even though a lower layer still has it.
const TOMBSTONE: &str = "__unistore_tombstone__";

/// Layers a stack of drivers, top-to-bottom, behind a single `Driver`
/// surface. Reads stop at the first layer with an answer; the tombstone
/// short-circuits a layer that has deleted a key a lower layer still holds.
/// Writes and removes only ever touch the top layer -- lower layers are
/// read-only from the overlay's perspective.
pub struct OverlayDriver {
    layers: Vec<Arc<dyn Driver>>,
}

impl OverlayDriver {
    /// `layers[0]` is the top (read/write) layer; the rest are read-only
    /// fallbacks consulted in order.
    pub fn new(layers: Vec<Arc<dyn Driver>>) -> Self {
        Self { layers }
    }
}

#[async_trait]
impl Driver for OverlayDriver {
    async fn has(&self, key: &str, opts: &Options) -> Result<bool> {
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.has(key, opts).await? {
                if i == 0 {
                    let is_tombstone =
                        layer.get(key, opts).await?.as_deref() == Some(TOMBSTONE);
                    return Ok(!is_tombstone);
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn get(&self, key: &str, opts: &Options) -> Result<Option<String>> {
        for layer in &self.layers {
            if let Some(text) = layer.get(key, opts).await? {
                return if text == TOMBSTONE { Ok(None) } else { Ok(Some(text)) };
            }
        }
        Ok(None)
    }

    async fn list_keys(&self, base: &str, opts: &Options) -> Result<Vec<String>> {
        // List each layer, union and dedupe, then drop any candidate the
        // top layer has tombstoned.
        let mut candidates = BTreeSet::new();
        for layer in &self.layers {
            candidates.extend(layer.list_keys(base, opts).await?);
        }

        let mut out = Vec::with_capacity(candidates.len());
        if let Some(top) = self.layers.first() {
            for key in candidates {
                let is_tombstone = top.get(&key, opts).await?.as_deref() == Some(TOMBSTONE);
                if !is_tombstone {
                    out.push(key);
                }
            }
        } else {
            out.extend(candidates);
        }
        Ok(out)
    }

    async fn set(&self, key: &str, value: &str, opts: &Options) -> Result<()> {
        if value == TOMBSTONE {
            return Err(StoreError::InvalidKey(
                "value collides with the overlay driver's reserved tombstone".to_string(),
            ));
        }
        if let Some(top) = self.layers.first() {
            top.set(key, value, opts).await?;
        }
        Ok(())
    }

    async fn remove(&self, key: &str, opts: &Options) -> Result<()> {
        if let Some(top) = self.layers.first() {
            // A layer that is the *only* layer, or whose key never existed
            // below it, can remove outright; writing a tombstone is only
            // necessary to mask a lower layer. Keeping it simple and always
            // tombstoning matches the spec's described behavior and avoids
            // a second lookup per remove.
            top.set(key, TOMBSTONE, opts).await?;
        }
        Ok(())
    }

    async fn clear(&self, base: &str, opts: &Options) -> Result<()> {
        if let Some(top) = self.layers.first() {
            top.clear(base, opts).await?;
        }
        Ok(())
    }

    async fn dispose(&self) -> Result<()> {
        // Best-effort: a lower layer failing to dispose shouldn't stop the
        // others from getting a chance to.
        for layer in &self.layers {
            let _ = layer.dispose().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemoryDriver;

    fn layered(top: MemoryDriver, bottom: MemoryDriver) -> OverlayDriver {
        OverlayDriver::new(vec![Arc::new(top), Arc::new(bottom)])
    }

    #[tokio::test]
    async fn reads_fall_through_to_lower_layer() {
        let top = MemoryDriver::new();
        let bottom = MemoryDriver::new();
        bottom.set("a", "base", &Options::default()).await.unwrap();
        let overlay = layered(top, bottom);
        assert_eq!(overlay.get("a", &Options::default()).await.unwrap(), Some("base".into()));
    }

    #[tokio::test]
    async fn writes_only_touch_top_layer() {
        let top = MemoryDriver::new();
        let bottom = MemoryDriver::new();
        let overlay = layered(top, bottom);
        overlay.set("a", "v1", &Options::default()).await.unwrap();
        assert_eq!(overlay.get("a", &Options::default()).await.unwrap(), Some("v1".into()));
    }

    #[tokio::test]
    async fn top_layer_shadows_bottom() {
        let top = MemoryDriver::new();
        let bottom = MemoryDriver::new();
        top.set("a", "top", &Options::default()).await.unwrap();
        bottom.set("a", "bottom", &Options::default()).await.unwrap();
        let overlay = layered(top, bottom);
        assert_eq!(overlay.get("a", &Options::default()).await.unwrap(), Some("top".into()));
    }

    #[tokio::test]
    async fn remove_tombstones_a_lower_layer_key() {
        let top = MemoryDriver::new();
        let bottom = MemoryDriver::new();
        bottom.set("a", "base", &Options::default()).await.unwrap();
        let overlay = layered(top, bottom);
        overlay.remove("a", &Options::default()).await.unwrap();
        assert_eq!(overlay.get("a", &Options::default()).await.unwrap(), None);
        assert!(!overlay.has("a", &Options::default()).await.unwrap());
    }

    #[tokio::test]
    async fn set_rejects_the_reserved_tombstone_value() {
        let top = MemoryDriver::new();
        let bottom = MemoryDriver::new();
        let overlay = layered(top, bottom);
        let err = overlay.set("a", TOMBSTONE, &Options::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn list_keys_unions_and_masks_tombstones() {
        let top = MemoryDriver::new();
        let bottom = MemoryDriver::new();
        bottom.set("a", "1", &Options::default()).await.unwrap();
        bottom.set("b", "1", &Options::default()).await.unwrap();
        let overlay = layered(top, bottom);
        overlay.remove("a", &Options::default()).await.unwrap();
        overlay.set("c", "1", &Options::default()).await.unwrap();
        let mut keys = overlay.list_keys("", &Options::default()).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["b".to_string(), "c".to_string()]);
    }
}
