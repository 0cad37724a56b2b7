//! okra device context.
//!
//! One context per `Bridge`, created on the first successful
//! `initialize_gpu` and kept for the life of the process. The backend has
//! no destroy entry point, so the context is never released explicitly.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::Mutex;

use okra_core::{BridgeError, HeapRegion, Result};

use crate::config::BridgeConfig;
use crate::ffi::OkraApi;

/// Live device context plus the function table it was created through.
pub struct DeviceContext {
    api: Arc<OkraApi>,
    raw: NonNull<c_void>,
    total_cores: u32,
    verify_object_refs: bool,
    pub(crate) heap: Mutex<Option<HeapRegion>>,
}

// Safety: the context handle is process-global on the backend side and is
// only passed back to okra entry points, which synchronize internally.
unsafe impl Send for DeviceContext {}
unsafe impl Sync for DeviceContext {}

impl DeviceContext {
    /// Create the backend context. A null handle means no usable device.
    pub(crate) fn create(api: Arc<OkraApi>, config: &BridgeConfig) -> Result<Self> {
        let raw = unsafe { (api.create_context)() };
        let raw = NonNull::new(raw).ok_or(BridgeError::Context)?;

        let queried = api
            .total_cores
            .map(|query| unsafe { query(raw.as_ptr()) })
            .filter(|&n| n > 0);
        let total_cores = queried.unwrap_or(config.fallback_cores);

        tracing::info!(
            "okra device context created ({} cores{})",
            total_cores,
            if queried.is_some() { "" } else { ", fallback" }
        );

        Ok(Self {
            api,
            raw,
            total_cores,
            verify_object_refs: config.verify_object_refs,
            heap: Mutex::new(None),
        })
    }

    /// Number of compute cores on the device.
    pub fn total_cores(&self) -> u32 {
        self.total_cores
    }

    pub(crate) fn api(&self) -> &OkraApi {
        &self.api
    }

    pub(crate) fn verify_object_refs(&self) -> bool {
        self.verify_object_refs
    }

    /// Raw backend handle.
    pub fn as_raw(&self) -> *mut c_void {
        self.raw.as_ptr()
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("raw", &self.raw)
            .field("total_cores", &self.total_cores)
            .field("heap", &*self.heap.lock())
            .finish()
    }
}
