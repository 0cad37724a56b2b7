//! Loaded kernel handles.

use std::borrow::Cow;
use std::ffi::c_void;
use std::ptr::NonNull;

use okra_core::{BridgeError, KernelBinary, Result};

use crate::context::DeviceContext;

/// A kernel binary loaded on a device context.
///
/// The backend keeps an argument queue per kernel, so a handle can be moved
/// to another thread but not shared: launching needs `&mut self`.
pub struct Kernel<'ctx> {
    ctx: &'ctx DeviceContext,
    raw: NonNull<c_void>,
    name: String,
    launches: u64,
}

// Safety: the handle is exclusively owned; the backend allows a kernel to be
// driven from any thread as long as calls on it are not concurrent.
unsafe impl Send for Kernel<'_> {}

impl DeviceContext {
    /// Load compiled device code. Rejection by the backend is recoverable:
    /// the caller should run this kernel on the host instead.
    pub fn generate_kernel(&self, binary: &KernelBinary<'_>) -> Result<Kernel<'_>> {
        let code = nul_terminated(binary.code());
        let name = std::ffi::CString::new(binary.name())
            .map_err(|_| BridgeError::InvalidKernel(format!("name {:?} contains a NUL byte", binary.name())))?;

        let raw = unsafe { (self.api().create_kernel)(self.as_raw(), code.as_ptr(), name.as_ptr()) };
        let raw = NonNull::new(raw).ok_or_else(|| {
            tracing::warn!("okra rejected kernel '{}' ({} bytes)", binary.name(), binary.code_len());
            BridgeError::KernelLoad {
                name: binary.name().to_string(),
            }
        })?;

        tracing::debug!("created kernel '{}' ({} bytes)", binary.name(), binary.code_len());
        Ok(Kernel {
            ctx: self,
            raw,
            name: binary.name().to_string(),
            launches: 0,
        })
    }
}

/// The create entry point takes no length, so code must end in NUL.
/// Already-terminated buffers are passed through without a copy.
fn nul_terminated(code: &[u8]) -> Cow<'_, [u8]> {
    if code.last() == Some(&0) {
        Cow::Borrowed(code)
    } else {
        let mut owned = Vec::with_capacity(code.len() + 1);
        owned.extend_from_slice(code);
        owned.push(0);
        Cow::Owned(owned)
    }
}

impl<'ctx> Kernel<'ctx> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Context this kernel was loaded on.
    pub fn context(&self) -> &'ctx DeviceContext {
        self.ctx
    }

    /// Successful launches so far.
    pub fn launches(&self) -> u64 {
        self.launches
    }

    pub(crate) fn record_launch(&mut self) {
        self.launches += 1;
    }

    pub fn as_raw(&self) -> *mut c_void {
        self.raw.as_ptr()
    }
}

impl std::fmt::Debug for Kernel<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("name", &self.name)
            .field("raw", &self.raw)
            .field("launches", &self.launches)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nul_terminated_borrows_when_possible() {
        let code = b"kernel &run()\0";
        assert!(matches!(nul_terminated(code), Cow::Borrowed(_)));
    }

    #[test]
    fn test_nul_terminated_appends() {
        let out = nul_terminated(b"abc");
        assert!(matches!(out, Cow::Owned(_)));
        assert_eq!(&*out, b"abc\0");
    }
}
