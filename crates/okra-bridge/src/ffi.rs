//! Runtime-resolved okra entry points.
//!
//! The bridge never links against the vendor runtime at build time. A
//! `SymbolResolver` hands over addresses for the named entry points and
//! `OkraApi::resolve` turns them into a typed, immutable function table.
//! The table is built all-or-nothing: a single missing push variant would
//! shift every later argument, so partial tables are never produced.

use std::ffi::{c_char, c_uint, c_void};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use parking_lot::Mutex;

use okra_core::{BridgeError, Result};

// Opaque handles
pub type OkraContext = *mut c_void;
pub type OkraKernel = *mut c_void;

// ---------------------------------------------------------------------------
// Entry point signatures
// ---------------------------------------------------------------------------

pub type FnCreateContext = unsafe extern "C" fn() -> OkraContext;
pub type FnCreateKernel = unsafe extern "C" fn(OkraContext, *const u8, *const c_char) -> OkraKernel;
pub type FnPushObject = unsafe extern "C" fn(OkraKernel, *mut c_void) -> bool;
pub type FnPushBoolean = unsafe extern "C" fn(OkraKernel, u8) -> bool;
pub type FnPushByte = unsafe extern "C" fn(OkraKernel, i8) -> bool;
pub type FnPushDouble = unsafe extern "C" fn(OkraKernel, f64) -> bool;
pub type FnPushFloat = unsafe extern "C" fn(OkraKernel, f32) -> bool;
pub type FnPushInt = unsafe extern "C" fn(OkraKernel, i32) -> bool;
pub type FnPushLong = unsafe extern "C" fn(OkraKernel, i64) -> bool;
pub type FnExecuteWithRange = unsafe extern "C" fn(OkraKernel, i32) -> bool;
pub type FnClearArgs = unsafe extern "C" fn(OkraKernel) -> bool;
pub type FnRegisterHeap = unsafe extern "C" fn(*mut c_void, usize) -> bool;
pub type FnTotalCores = unsafe extern "C" fn(OkraContext) -> c_uint;

// ---------------------------------------------------------------------------
// Symbol names
// ---------------------------------------------------------------------------

pub const SYM_CREATE_CONTEXT: &str = "okra_create_context";
pub const SYM_CREATE_KERNEL: &str = "okra_create_kernel";
pub const SYM_PUSH_OBJECT: &str = "okra_push_object";
pub const SYM_PUSH_BOOLEAN: &str = "okra_push_boolean";
pub const SYM_PUSH_BYTE: &str = "okra_push_byte";
pub const SYM_PUSH_DOUBLE: &str = "okra_push_double";
pub const SYM_PUSH_FLOAT: &str = "okra_push_float";
pub const SYM_PUSH_INT: &str = "okra_push_int";
pub const SYM_PUSH_LONG: &str = "okra_push_long";
pub const SYM_EXECUTE_WITH_RANGE: &str = "okra_execute_with_range";
pub const SYM_CLEARARGS: &str = "okra_clearargs";
pub const SYM_REGISTER_HEAP: &str = "okra_register_heap";

/// Optional capability query; not part of the required set.
pub const SYM_TOTAL_CORES: &str = "okra_total_cores";

/// Every entry point the bridge refuses to run without, in table order.
pub const REQUIRED_SYMBOLS: [&str; 12] = [
    SYM_CREATE_CONTEXT,
    SYM_CREATE_KERNEL,
    SYM_PUSH_OBJECT,
    SYM_PUSH_BOOLEAN,
    SYM_PUSH_BYTE,
    SYM_PUSH_DOUBLE,
    SYM_PUSH_FLOAT,
    SYM_PUSH_INT,
    SYM_PUSH_LONG,
    SYM_EXECUTE_WITH_RANGE,
    SYM_CLEARARGS,
    SYM_REGISTER_HEAP,
];

// ---------------------------------------------------------------------------
// Symbol resolution
// ---------------------------------------------------------------------------

/// Supplies pre-resolved entry point addresses.
///
/// This is the dynamic-loader collaborator: the bridge asks for names and
/// never searches the filesystem itself.
pub trait SymbolResolver: Send + Sync {
    /// Prepare for a batch of lookups. Called once per `OkraApi::resolve`;
    /// `false` means no symbol can resolve and the lookups are skipped.
    fn open(&self) -> bool {
        true
    }

    /// Address of `symbol`, or `None` if it is not exported.
    fn resolve(&self, symbol: &str) -> Option<*const c_void>;

    /// Library that must stay loaded while resolved addresses are in use.
    fn library(&self) -> Option<Arc<Library>> {
        None
    }
}

/// Resolver over a shared library opened with `libloading`.
///
/// `open` loads the library the first time it succeeds; a failed open is
/// retried on the next call. `resolve` only looks into a library that is
/// already open.
pub struct LibraryResolver {
    path: PathBuf,
    lib: Mutex<Option<Arc<Library>>>,
}

impl LibraryResolver {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lib: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Option<Arc<Library>> {
        let mut slot = self.lib.lock();
        if let Some(lib) = slot.as_ref() {
            return Some(Arc::clone(lib));
        }
        // Safety: loading runs the library's initializers; the okra runtime
        // has no initialization-order requirements beyond being loaded once.
        match unsafe { Library::new(&self.path) } {
            Ok(lib) => {
                let lib = Arc::new(lib);
                *slot = Some(Arc::clone(&lib));
                tracing::info!("loaded okra runtime from {}", self.path.display());
                Some(lib)
            }
            Err(e) => {
                tracing::warn!("failed to load okra runtime {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

impl SymbolResolver for LibraryResolver {
    fn open(&self) -> bool {
        self.load().is_some()
    }

    fn resolve(&self, symbol: &str) -> Option<*const c_void> {
        let lib = self.lib.lock().clone()?;
        // Safety: the symbol is read as an untyped address; it is only cast to
        // its function type by `OkraApi::resolve`.
        let addr = unsafe { lib.get::<*const c_void>(symbol.as_bytes()) }
            .map(|sym| *sym)
            .ok()?;
        (!addr.is_null()).then_some(addr)
    }

    fn library(&self) -> Option<Arc<Library>> {
        self.lib.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// Function table
// ---------------------------------------------------------------------------

/// Fully bound okra function table. Immutable once built.
pub struct OkraApi {
    _lib: Option<Arc<Library>>,
    pub create_context: FnCreateContext,
    pub create_kernel: FnCreateKernel,
    pub push_object: FnPushObject,
    pub push_boolean: FnPushBoolean,
    pub push_byte: FnPushByte,
    pub push_double: FnPushDouble,
    pub push_float: FnPushFloat,
    pub push_int: FnPushInt,
    pub push_long: FnPushLong,
    pub execute_with_range: FnExecuteWithRange,
    pub clearargs: FnClearArgs,
    pub register_heap: FnRegisterHeap,
    pub total_cores: Option<FnTotalCores>,
}

impl OkraApi {
    /// Bind every required entry point through `resolver`.
    ///
    /// Fails with `BridgeError::Linkage` naming all unresolved symbols if
    /// even one is missing.
    pub fn resolve(resolver: &dyn SymbolResolver) -> Result<Self> {
        if !resolver.open() {
            return Err(BridgeError::Linkage {
                missing: REQUIRED_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            });
        }

        let mut addrs = [std::ptr::null::<c_void>(); REQUIRED_SYMBOLS.len()];
        let mut missing = Vec::new();
        for (slot, name) in addrs.iter_mut().zip(REQUIRED_SYMBOLS) {
            match resolver.resolve(name).filter(|a| !a.is_null()) {
                Some(addr) => *slot = addr,
                None => missing.push(name.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(BridgeError::Linkage { missing });
        }

        let [create_context, create_kernel, push_object, push_boolean, push_byte, push_double, push_float, push_int, push_long, execute_with_range, clearargs, register_heap] =
            addrs;

        // Safety: each address was exported under the name whose signature it
        // is cast to, and every address is non-null.
        unsafe {
            Ok(OkraApi {
                _lib: resolver.library(),
                create_context: cast_fn(create_context),
                create_kernel: cast_fn(create_kernel),
                push_object: cast_fn(push_object),
                push_boolean: cast_fn(push_boolean),
                push_byte: cast_fn(push_byte),
                push_double: cast_fn(push_double),
                push_float: cast_fn(push_float),
                push_int: cast_fn(push_int),
                push_long: cast_fn(push_long),
                execute_with_range: cast_fn(execute_with_range),
                clearargs: cast_fn(clearargs),
                register_heap: cast_fn(register_heap),
                total_cores: resolver
                    .resolve(SYM_TOTAL_CORES)
                    .filter(|a| !a.is_null())
                    .map(|a| cast_fn::<FnTotalCores>(a)),
            })
        }
    }
}

/// Reinterpret a symbol address as a function pointer.
///
/// # Safety
/// `addr` must be non-null and point to a function with signature `F`.
unsafe fn cast_fn<F: Copy>(addr: *const c_void) -> F {
    debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*const c_void>());
    std::mem::transmute_copy::<*const c_void, F>(&addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    unsafe extern "C" fn fake_clearargs(_k: OkraKernel) -> bool {
        true
    }

    /// Resolves every name to the same dummy function, except the skipped ones.
    struct Partial(HashSet<&'static str>);

    impl SymbolResolver for Partial {
        fn resolve(&self, symbol: &str) -> Option<*const c_void> {
            if self.0.contains(symbol) {
                None
            } else {
                Some(fake_clearargs as FnClearArgs as *const c_void)
            }
        }
    }

    #[test]
    fn test_required_symbols_unique() {
        let set: HashSet<_> = REQUIRED_SYMBOLS.iter().collect();
        assert_eq!(set.len(), REQUIRED_SYMBOLS.len());
        assert!(!set.contains(&SYM_TOTAL_CORES));
    }

    #[test]
    fn test_resolve_all_present() {
        let api = OkraApi::resolve(&Partial(HashSet::new())).unwrap();
        assert!(api.total_cores.is_some());
        assert!(unsafe { (api.clearargs)(std::ptr::null_mut()) });
    }

    #[test]
    fn test_resolve_reports_every_missing_symbol() {
        let skip: HashSet<_> = [SYM_PUSH_LONG, SYM_REGISTER_HEAP].into_iter().collect();
        match OkraApi::resolve(&Partial(skip)) {
            Err(BridgeError::Linkage { missing }) => {
                assert_eq!(missing, vec![SYM_PUSH_LONG.to_string(), SYM_REGISTER_HEAP.to_string()]);
            }
            Err(e) => panic!("unexpected error {e}"),
            Ok(_) => panic!("partial table must not be produced"),
        }
    }

    #[test]
    fn test_optional_total_cores() {
        let skip: HashSet<_> = [SYM_TOTAL_CORES].into_iter().collect();
        let api = OkraApi::resolve(&Partial(skip)).unwrap();
        assert!(api.total_cores.is_none());
    }

    /// Counts calls; never opens.
    #[derive(Default)]
    struct Unavailable {
        opens: AtomicUsize,
        lookups: AtomicUsize,
    }

    impl SymbolResolver for Unavailable {
        fn open(&self) -> bool {
            self.opens.fetch_add(1, Ordering::Relaxed);
            false
        }

        fn resolve(&self, _symbol: &str) -> Option<*const c_void> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    #[test]
    fn test_unavailable_library_opened_once_per_resolve() {
        let resolver = Unavailable::default();
        for attempt in 1..=2 {
            match OkraApi::resolve(&resolver) {
                Err(BridgeError::Linkage { missing }) => assert_eq!(missing.len(), REQUIRED_SYMBOLS.len()),
                Err(e) => panic!("unexpected error {e}"),
                Ok(_) => panic!("nothing resolves"),
            }
            assert_eq!(resolver.opens.load(Ordering::Relaxed), attempt);
        }
        assert_eq!(resolver.lookups.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_library_resolver_missing_library() {
        let resolver = LibraryResolver::new("/nonexistent/libokra_missing.so");
        assert!(!resolver.open());
        assert!(resolver.resolve(SYM_CREATE_CONTEXT).is_none());
        assert!(resolver.library().is_none());
        assert!(matches!(
            OkraApi::resolve(&resolver),
            Err(BridgeError::Linkage { missing }) if missing.len() == REQUIRED_SYMBOLS.len()
        ));
    }
}
