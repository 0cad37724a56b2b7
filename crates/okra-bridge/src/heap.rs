//! Heap registration: tells the device where host objects live.

use okra_core::{BridgeError, HeapRegion, HeapSource, Result};

use crate::context::DeviceContext;

impl DeviceContext {
    /// Register the current extent of `heap` with the device.
    ///
    /// The newest successful registration replaces the previous one. A
    /// rejected registration leaves no region active, so later launches fail
    /// with `HeapNotRegistered` instead of touching unregistered memory.
    pub fn register_heap(&self, heap: &dyn HeapSource) -> Result<HeapRegion> {
        let region = heap.committed_region();
        let mut active = self.heap.lock();

        if region.is_empty() {
            *active = None;
            return Err(BridgeError::HeapRegistration {
                base: region.base,
                size: region.size,
            });
        }

        let ok = unsafe { (self.api().register_heap)(region.base as *mut std::ffi::c_void, region.size) };
        if !ok {
            *active = None;
            tracing::warn!("okra rejected heap registration {}", region);
            return Err(BridgeError::HeapRegistration {
                base: region.base,
                size: region.size,
            });
        }

        if let Some(prev) = active.replace(region) {
            if prev != region {
                tracing::info!("heap registration moved {} -> {}", prev, region);
            }
        } else {
            tracing::info!("heap registered {} ({} bytes)", region, region.size);
        }
        Ok(region)
    }

    /// Currently active heap registration.
    pub fn registered_heap(&self) -> Option<HeapRegion> {
        *self.heap.lock()
    }
}
