//! # okra-bridge
//!
//! Invocation protocol between a JIT runtime and the okra GPU runtime.
//!
//! The okra runtime is reached only through C entry points resolved at run
//! time. This crate binds them into a typed table, owns the single device
//! context, registers the managed heap, loads kernels, and marshals
//! arguments into the positional push queue before a blocking 1-D launch.
//!
//! ```no_run
//! use okra_bridge::OffloadRequest;
//! use okra_core::{ArgumentValue, HeapRegion, KernelBinary, KernelSignature};
//!
//! # fn main() -> okra_core::Result<()> {
//! let bridge = okra_bridge::global();
//! let heap = vec![0u8; 4096];
//! let code = std::fs::read("scale.hsail").unwrap_or_default();
//! let signature = KernelSignature::parse("(IF)V", true)?;
//! bridge.offload(
//!     &OffloadRequest {
//!         binary: KernelBinary::new(&code, "scale")?,
//!         signature: &signature,
//!         args: &[ArgumentValue::Int(3), ArgumentValue::Float(0.5)],
//!         dim_x: 1024,
//!     },
//!     &HeapRegion::from_slice(&heap),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod context;
pub mod ffi;
mod heap;
pub mod kernel;
mod launch;
pub mod marshal;
pub mod sim;

pub use bridge::{global, init_global, Bridge, OffloadRequest};
pub use config::BridgeConfig;
pub use context::DeviceContext;
pub use ffi::{LibraryResolver, OkraApi, SymbolResolver};
pub use kernel::Kernel;
