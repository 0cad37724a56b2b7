//! # okra-core
//!
//! Data model for the okra GPU offload bridge.
//!
//! Provides:
//! - `ArgumentValue` / `ObjectRef`: typed kernel arguments in VM calling order
//! - `ParamKind` / `KernelSignature`: per-slot push dispatch parsed from a method descriptor
//! - `KernelBinary`: borrowed device code plus display name
//! - `LaunchRange`: validated 1-D dispatch extent
//! - `HeapRegion` / `HeapSource`: the managed heap extent shown to the device
//! - `BridgeError`: failure taxonomy shared by every bridge layer

pub mod binary;
pub mod error;
pub mod heap;
pub mod range;
pub mod signature;
pub mod value;

pub use binary::KernelBinary;
pub use error::BridgeError;
pub use heap::{HeapRegion, HeapSource};
pub use range::LaunchRange;
pub use signature::{KernelSignature, ParamKind, PushFn};
pub use value::{ArgumentValue, ObjectRef};

pub type Result<T> = std::result::Result<T, BridgeError>;
