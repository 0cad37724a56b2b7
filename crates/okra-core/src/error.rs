use crate::signature::ParamKind;

/// Errors raised while linking, initializing, or launching on the okra backend.
///
/// Every failure is reported at the step where it happens; nothing is retried
/// inside the bridge. Callers decide between host fallback and a hard error.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("okra backend linkage failed, unresolved entry points: {}", missing.join(", "))]
    Linkage { missing: Vec<String> },

    #[error("okra device context creation failed")]
    Context,

    #[error("{0} called before the device context was initialized")]
    NotInitialized(&'static str),

    #[error("heap registration rejected for base {base:#x} size {size}")]
    HeapRegistration { base: usize, size: usize },

    #[error("no heap region registered with the device")]
    HeapNotRegistered,

    #[error("invalid kernel binary: {0}")]
    InvalidKernel(String),

    #[error("backend rejected kernel '{name}'")]
    KernelLoad { name: String },

    #[error("invalid method descriptor '{descriptor}': {reason}")]
    InvalidSignature { descriptor: String, reason: String },

    #[error("unsupported kernel signature: {0}")]
    UnsupportedSignature(String),

    #[error("invalid launch range: dimX={0} (must be > 0)")]
    InvalidRange(i32),

    #[error("argument count mismatch: signature expects {expected}, got {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[error("argument {index}: expected {expected}, got {found}")]
    ArgumentMismatch {
        index: usize,
        expected: ParamKind,
        found: ParamKind,
    },

    #[error("receiver argument is null")]
    NullReceiver,

    #[error("argument {index}: object {addr:#x} lies outside the registered heap")]
    UnregisteredObject { index: usize, addr: usize },

    #[error("clearing arguments failed on kernel '{kernel}'")]
    ClearArgs { kernel: String },

    #[error("push of argument {index} ({kind}) failed")]
    ArgumentPush { index: usize, kind: ParamKind },

    #[error("GPU execution failed for kernel '{kernel}'")]
    Execution { kernel: String },

    #[error("config error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Whether GPU offload must be disabled for the rest of the process.
    ///
    /// Linkage, context, and heap registration failures poison the session;
    /// everything else only fails the current call site.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::Linkage { .. }
                | BridgeError::Context
                | BridgeError::HeapRegistration { .. }
        )
    }

    /// Whether the launch was abandoned before the kernel could run.
    pub fn not_executed(&self) -> bool {
        !matches!(self, BridgeError::Execution { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(BridgeError::Linkage { missing: vec!["okra_clearargs".into()] }.is_fatal());
        assert!(BridgeError::Context.is_fatal());
        assert!(BridgeError::HeapRegistration { base: 0x1000, size: 16 }.is_fatal());
        assert!(!BridgeError::KernelLoad { name: "k".into() }.is_fatal());
        assert!(!BridgeError::InvalidRange(0).is_fatal());
        assert!(!BridgeError::Execution { kernel: "k".into() }.is_fatal());
    }

    #[test]
    fn test_not_executed() {
        assert!(BridgeError::ArgumentPush { index: 2, kind: ParamKind::Object }.not_executed());
        assert!(!BridgeError::Execution { kernel: "k".into() }.not_executed());
    }

    #[test]
    fn test_display() {
        let err = BridgeError::Linkage {
            missing: vec!["okra_push_int".into(), "okra_clearargs".into()],
        };
        assert_eq!(
            err.to_string(),
            "okra backend linkage failed, unresolved entry points: okra_push_int, okra_clearargs"
        );
        let err = BridgeError::ArgumentMismatch {
            index: 1,
            expected: ParamKind::Double,
            found: ParamKind::Float,
        };
        assert_eq!(err.to_string(), "argument 1: expected double, got float");
        assert_eq!(
            BridgeError::UnregisteredObject { index: 0, addr: 0xdead }.to_string(),
            "argument 0: object 0xdead lies outside the registered heap"
        );
    }
}
