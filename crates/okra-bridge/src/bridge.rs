//! Process-scoped bridge: linkage, the single device context, and the
//! entry points a JIT runtime calls.

use std::sync::{Arc, OnceLock};

use okra_core::{ArgumentValue, BridgeError, HeapRegion, HeapSource, KernelBinary, KernelSignature, LaunchRange, Result};

use crate::config::BridgeConfig;
use crate::context::DeviceContext;
use crate::ffi::{LibraryResolver, OkraApi, SymbolResolver};
use crate::kernel::Kernel;

/// Owns the function table and device context for one okra runtime.
///
/// Linkage is retried until it succeeds once. Context creation is attempted
/// exactly once; its outcome, success or failure, is kept for the life of
/// the bridge.
///
/// Every `Bridge` creates its own backend context. Against the native
/// library, use the per-process singleton from [`global`] or [`init_global`]
/// instead of building bridges with `from_config`; separate instances are
/// for tests and simulated runtimes.
pub struct Bridge {
    resolver: Box<dyn SymbolResolver>,
    config: BridgeConfig,
    api: OnceLock<Arc<OkraApi>>,
    device: OnceLock<Option<DeviceContext>>,
}

/// Everything needed to run one kernel from scratch.
#[derive(Debug, Clone, Copy)]
pub struct OffloadRequest<'a> {
    pub binary: KernelBinary<'a>,
    pub signature: &'a KernelSignature,
    pub args: &'a [ArgumentValue],
    pub dim_x: i32,
}

impl Bridge {
    pub fn new(resolver: impl SymbolResolver + 'static, config: BridgeConfig) -> Self {
        Self {
            resolver: Box::new(resolver),
            config,
            api: OnceLock::new(),
            device: OnceLock::new(),
        }
    }

    /// Bridge over the shared library named by `config.library_path`.
    pub fn from_config(config: BridgeConfig) -> Self {
        let resolver = LibraryResolver::new(&config.library_path);
        Self::new(resolver, config)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Bind the okra entry points if they are not bound yet.
    pub fn probe_linkage(&self) -> Result<()> {
        if self.api.get().is_some() {
            return Ok(());
        }
        match OkraApi::resolve(self.resolver.as_ref()) {
            Ok(api) => {
                // A concurrent caller may have won; both tables are equivalent.
                if self.api.set(Arc::new(api)).is_ok() {
                    tracing::info!("okra entry points bound");
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!("okra linkage failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn is_linked(&self) -> bool {
        self.api.get().is_some()
    }

    /// Create the device context, or return the one already created.
    pub fn initialize_gpu(&self) -> Result<&DeviceContext> {
        self.probe_linkage()?;
        let api = self.api.get().ok_or(BridgeError::NotInitialized("initialize_gpu"))?;

        let slot = self.device.get_or_init(|| match DeviceContext::create(Arc::clone(api), &self.config) {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                tracing::warn!("okra context creation failed, GPU offload disabled: {}", e);
                None
            }
        });
        slot.as_ref().ok_or(BridgeError::Context)
    }

    /// The device context, if `initialize_gpu` has succeeded.
    pub fn device(&self) -> Option<&DeviceContext> {
        self.device.get().and_then(Option::as_ref)
    }

    fn require_device(&self, op: &'static str) -> Result<&DeviceContext> {
        match self.device.get() {
            Some(Some(ctx)) => Ok(ctx),
            Some(None) => Err(BridgeError::Context),
            None => Err(BridgeError::NotInitialized(op)),
        }
    }

    pub fn total_cores(&self) -> Result<u32> {
        Ok(self.require_device("total_cores")?.total_cores())
    }

    pub fn register_heap(&self, heap: &dyn HeapSource) -> Result<HeapRegion> {
        self.require_device("register_heap")?.register_heap(heap)
    }

    pub fn generate_kernel(&self, binary: &KernelBinary<'_>) -> Result<Kernel<'_>> {
        self.require_device("generate_kernel")?.generate_kernel(binary)
    }

    /// Launch `kernel` over `dim_x` work-items with `args` in declaration order.
    pub fn execute_kernel_void_1d(
        &self,
        kernel: &mut Kernel<'_>,
        dim_x: i32,
        args: &[ArgumentValue],
        signature: &KernelSignature,
    ) -> Result<()> {
        let ctx = self.require_device("execute_kernel_void_1d")?;
        if !std::ptr::eq(ctx, kernel.context()) {
            return Err(BridgeError::InvalidKernel(format!(
                "kernel '{}' was created on another context",
                kernel.name()
            )));
        }
        kernel.execute_void_1d(dim_x, args, signature)
    }

    /// Run one request end to end: initialize, register `heap` if nothing is
    /// registered yet, load the kernel, marshal, launch.
    ///
    /// Stops at the first failing step. On any error other than
    /// `Execution` the kernel never ran.
    pub fn offload(&self, request: &OffloadRequest<'_>, heap: &dyn HeapSource) -> Result<()> {
        LaunchRange::new_1d(request.dim_x)?;

        let ctx = self.initialize_gpu()?;
        if ctx.registered_heap().is_none() {
            ctx.register_heap(heap)?;
        }
        let mut kernel = ctx.generate_kernel(&request.binary)?;
        kernel.execute_void_1d(request.dim_x, request.args, request.signature)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("linked", &self.is_linked())
            .field("device", &self.device.get())
            .finish()
    }
}

static GLOBAL: OnceLock<Bridge> = OnceLock::new();

/// Process-wide bridge configured from the environment.
///
/// An unreadable configuration falls back to the defaults.
pub fn global() -> &'static Bridge {
    GLOBAL.get_or_init(|| {
        let config = BridgeConfig::from_env().unwrap_or_else(|e| {
            tracing::warn!("okra config ignored, using defaults: {}", e);
            BridgeConfig::default()
        });
        Bridge::from_config(config)
    })
}

/// Process-wide bridge built from `config`.
///
/// Only the first call (of this or [`global`]) decides the configuration;
/// later calls return the existing bridge.
pub fn init_global(config: BridgeConfig) -> &'static Bridge {
    let mut created = false;
    let bridge = GLOBAL.get_or_init(|| {
        created = true;
        Bridge::from_config(config.clone())
    });
    if !created && bridge.config() != &config {
        tracing::warn!("okra bridge already initialized; keeping library {}", bridge.config().library_path.display());
    }
    bridge
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{self, SimCall, SimOptions};

    #[test]
    fn test_not_initialized() {
        let sim = sim::install(SimOptions::default());
        let bridge = Bridge::new(sim.clone(), BridgeConfig::default());
        assert!(matches!(bridge.total_cores(), Err(BridgeError::NotInitialized("total_cores"))));
        let region = HeapRegion::new(0x1000, 0x100);
        assert!(matches!(bridge.register_heap(&region), Err(BridgeError::NotInitialized(_))));
        assert!(sim.journal().is_empty());
    }

    #[test]
    fn test_initialize_links_first() {
        let sim = sim::install(SimOptions::default());
        let bridge = Bridge::new(sim.clone(), BridgeConfig::default());
        assert!(!bridge.is_linked());
        bridge.initialize_gpu().unwrap();
        assert!(bridge.is_linked());
        assert!(bridge.device().is_some());
        assert_eq!(sim.journal(), vec![SimCall::CreateContext]);
    }

    #[test]
    fn test_foreign_kernel_rejected() {
        let a = Bridge::new(sim::install(SimOptions::default()), BridgeConfig::default());
        let b = Bridge::new(sim::install(SimOptions::default()), BridgeConfig::default());
        let heap = vec![0u8; 64];
        for bridge in [&a, &b] {
            bridge.initialize_gpu().unwrap();
            bridge.register_heap(&HeapRegion::from_slice(&heap)).unwrap();
        }
        let binary = KernelBinary::new(b"code", "k").unwrap();
        let mut kernel = a.generate_kernel(&binary).unwrap();
        let sig = KernelSignature::void(Vec::<okra_core::ParamKind>::new(), false);
        assert!(matches!(
            b.execute_kernel_void_1d(&mut kernel, 4, &[], &sig),
            Err(BridgeError::InvalidKernel(_))
        ));
        a.execute_kernel_void_1d(&mut kernel, 4, &[], &sig).unwrap();
        assert_eq!(kernel.launches(), 1);
    }

    #[test]
    fn test_global_is_process_singleton() {
        let config = BridgeConfig {
            library_path: "/nonexistent/libokra_singleton.so".into(),
            ..Default::default()
        };
        let first = init_global(config.clone());
        assert!(std::ptr::eq(first, global()));
        assert!(std::ptr::eq(first, init_global(BridgeConfig::default())));
        assert_eq!(first.config(), &config);
        assert!(matches!(first.initialize_gpu(), Err(BridgeError::Linkage { .. })));
    }
}
