//! In-process simulated okra runtime.
//!
//! Exposes the full okra entry point set as `extern "C"` functions behind a
//! `SimResolver`, so the bridge can be driven end to end without a device.
//! Every call is appended to a journal, and individual entry points can be
//! made to fail.
//!
//! Each `install` creates an independent runtime instance in one of a fixed
//! number of process-wide slots. Its state sits behind a mutex, so a bridge
//! over it can be driven from any thread. The two entry points that take no
//! handle (`okra_create_context`, `okra_register_heap`) are instantiated per
//! slot; context and kernel handles encode their slot, so every other entry
//! point finds its instance from the handle alone.

use std::ffi::{c_char, c_uint, c_void, CStr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::ffi::{self, OkraContext, OkraKernel, SymbolResolver};

/// Failure injection and capabilities of the simulated runtime.
#[derive(Debug, Clone, Default)]
pub struct SimOptions {
    /// Entry points the resolver pretends are not exported.
    pub missing_symbols: Vec<&'static str>,
    /// `okra_create_context` returns null.
    pub fail_context: bool,
    /// `okra_create_kernel` returns null.
    pub reject_kernels: bool,
    /// `okra_clearargs` returns false.
    pub fail_clear: bool,
    /// Push of the argument at this queue position returns false.
    pub fail_push_at: Option<usize>,
    /// `okra_execute_with_range` returns false.
    pub fail_execute: bool,
    /// `okra_register_heap` returns false.
    pub fail_heap: bool,
    /// Value reported by `okra_total_cores`; `None` leaves it unexported.
    pub total_cores: Option<u32>,
}

/// A value as received by one of the seven push entry points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimArg {
    Object(usize),
    Boolean(bool),
    Byte(i8),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

/// One entry point invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall {
    CreateContext,
    TotalCores,
    RegisterHeap { base: usize, size: usize },
    CreateKernel { name: String, code_len: usize },
    ClearArgs { kernel: String },
    Push { kernel: String, arg: SimArg },
    Execute { kernel: String, dim_x: i32, args: Vec<SimArg> },
}

struct SimKernel {
    name: String,
    queue: Vec<SimArg>,
}

#[derive(Default)]
struct SimState {
    options: SimOptions,
    journal: Vec<SimCall>,
    kernels: Vec<SimKernel>,
}

struct SimInstance {
    slot: usize,
    state: Mutex<SimState>,
}

impl Drop for SimInstance {
    fn drop(&mut self) {
        let mut entry = INSTANCES[self.slot].lock();
        // the slot may already belong to a newer instance
        if entry.as_ref().map_or(false, |w| w.strong_count() == 0) {
            *entry = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Slots and handles
// ---------------------------------------------------------------------------

const SLOTS: usize = 32;
const SLOT_SHIFT: u32 = 20;
const INDEX_MASK: usize = (1 << SLOT_SHIFT) - 1;

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: Mutex<Option<Weak<SimInstance>>> = parking_lot::const_mutex(None);

static INSTANCES: [Mutex<Option<Weak<SimInstance>>>; SLOTS] = [EMPTY_SLOT; SLOTS];
static INSTALL: Mutex<()> = parking_lot::const_mutex(());
static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);

fn instance(slot: usize) -> Option<Arc<SimInstance>> {
    let entry = INSTANCES.get(slot)?.lock();
    entry.as_ref().and_then(Weak::upgrade)
}

fn with_state<R>(slot: usize, f: impl FnOnce(&mut SimState) -> R) -> Option<R> {
    let inst = instance(slot)?;
    let mut state = inst.state.lock();
    Some(f(&mut state))
}

/// Handles are `(slot + 1) << SLOT_SHIFT | (kernel index + 1)`; contexts carry index 0.
fn handle(slot: usize, index: Option<usize>) -> *mut c_void {
    (((slot + 1) << SLOT_SHIFT) | index.map_or(0, |i| i + 1)) as *mut c_void
}

fn decode(raw: *mut c_void) -> Option<(usize, Option<usize>)> {
    let bits = raw as usize;
    let slot = (bits >> SLOT_SHIFT).checked_sub(1)?;
    (slot < SLOTS).then_some((slot, (bits & INDEX_MASK).checked_sub(1)))
}

macro_rules! per_slot {
    ($f:ident as $ty:ty) => {
        per_slot!(@ $f as $ty; 0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31)
    };
    (@ $f:ident as $ty:ty; $($n:literal)*) => {
        [$($f::<$n> as $ty),*]
    };
}

static CREATE_CONTEXT: [ffi::FnCreateContext; SLOTS] = per_slot!(sim_create_context as ffi::FnCreateContext);
static REGISTER_HEAP: [ffi::FnRegisterHeap; SLOTS] = per_slot!(sim_register_heap as ffi::FnRegisterHeap);

// ---------------------------------------------------------------------------
// Installation
// ---------------------------------------------------------------------------

/// Create a fresh simulated runtime and return the resolver for it.
///
/// The instance lives as long as any clone of the resolver.
pub fn install(options: SimOptions) -> SimResolver {
    let _guard = INSTALL.lock();
    let start = NEXT_SLOT.fetch_add(1, Ordering::Relaxed);
    let free = (0..SLOTS)
        .map(|i| (start + i) % SLOTS)
        .find(|&slot| INSTANCES[slot].lock().as_ref().map_or(true, |w| w.strong_count() == 0));
    let slot = free.unwrap_or_else(|| {
        tracing::warn!("all {} simulated runtime slots in use, reusing one", SLOTS);
        start % SLOTS
    });

    let inner = Arc::new(SimInstance {
        slot,
        state: Mutex::new(SimState {
            options,
            ..SimState::default()
        }),
    });
    *INSTANCES[slot].lock() = Some(Arc::downgrade(&inner));
    SimResolver { inner }
}

/// Resolver over one simulated runtime instance, plus its inspection API.
#[derive(Clone)]
pub struct SimResolver {
    inner: Arc<SimInstance>,
}

impl SimResolver {
    /// Change failure injection without clearing the journal or loaded kernels.
    pub fn configure(&self, f: impl FnOnce(&mut SimOptions)) {
        f(&mut self.inner.state.lock().options);
    }

    /// Calls recorded so far.
    pub fn journal(&self) -> Vec<SimCall> {
        self.inner.state.lock().journal.clone()
    }

    /// Drain the journal.
    pub fn take_journal(&self) -> Vec<SimCall> {
        std::mem::take(&mut self.inner.state.lock().journal)
    }
}

impl std::fmt::Debug for SimResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimResolver").field("slot", &self.inner.slot).finish()
    }
}

impl SymbolResolver for SimResolver {
    fn resolve(&self, symbol: &str) -> Option<*const c_void> {
        let slot = self.inner.slot;
        let (missing, has_cores) = {
            let s = self.inner.state.lock();
            (
                s.options.missing_symbols.iter().any(|m| *m == symbol),
                s.options.total_cores.is_some(),
            )
        };
        if missing {
            return None;
        }
        let addr = match symbol {
            ffi::SYM_CREATE_CONTEXT => CREATE_CONTEXT[slot] as *const c_void,
            ffi::SYM_CREATE_KERNEL => sim_create_kernel as ffi::FnCreateKernel as *const c_void,
            ffi::SYM_PUSH_OBJECT => sim_push_object as ffi::FnPushObject as *const c_void,
            ffi::SYM_PUSH_BOOLEAN => sim_push_boolean as ffi::FnPushBoolean as *const c_void,
            ffi::SYM_PUSH_BYTE => sim_push_byte as ffi::FnPushByte as *const c_void,
            ffi::SYM_PUSH_DOUBLE => sim_push_double as ffi::FnPushDouble as *const c_void,
            ffi::SYM_PUSH_FLOAT => sim_push_float as ffi::FnPushFloat as *const c_void,
            ffi::SYM_PUSH_INT => sim_push_int as ffi::FnPushInt as *const c_void,
            ffi::SYM_PUSH_LONG => sim_push_long as ffi::FnPushLong as *const c_void,
            ffi::SYM_EXECUTE_WITH_RANGE => sim_execute_with_range as ffi::FnExecuteWithRange as *const c_void,
            ffi::SYM_CLEARARGS => sim_clearargs as ffi::FnClearArgs as *const c_void,
            ffi::SYM_REGISTER_HEAP => REGISTER_HEAP[slot] as *const c_void,
            ffi::SYM_TOTAL_CORES if has_cores => sim_total_cores as ffi::FnTotalCores as *const c_void,
            _ => return None,
        };
        Some(addr)
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

unsafe extern "C" fn sim_create_context<const SLOT: usize>() -> OkraContext {
    with_state(SLOT, |s| {
        s.journal.push(SimCall::CreateContext);
        if s.options.fail_context {
            std::ptr::null_mut()
        } else {
            handle(SLOT, None)
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

unsafe extern "C" fn sim_register_heap<const SLOT: usize>(base: *mut c_void, size: usize) -> bool {
    with_state(SLOT, |s| {
        s.journal.push(SimCall::RegisterHeap {
            base: base as usize,
            size,
        });
        !s.options.fail_heap
    })
    .unwrap_or(false)
}

/// Slot of a context handle issued by `sim_create_context`.
fn context_slot(ctx: OkraContext) -> Option<usize> {
    match decode(ctx)? {
        (slot, None) => Some(slot),
        _ => None,
    }
}

unsafe extern "C" fn sim_total_cores(ctx: OkraContext) -> c_uint {
    context_slot(ctx)
        .and_then(|slot| {
            with_state(slot, |s| {
                s.journal.push(SimCall::TotalCores);
                s.options.total_cores.unwrap_or(0)
            })
        })
        .unwrap_or(0)
}

unsafe extern "C" fn sim_create_kernel(ctx: OkraContext, code: *const u8, name: *const c_char) -> OkraKernel {
    let Some(slot) = context_slot(ctx) else {
        return std::ptr::null_mut();
    };
    if code.is_null() || name.is_null() {
        return std::ptr::null_mut();
    }
    // Safety: the bridge passes NUL-terminated code and name buffers.
    let code_len = CStr::from_ptr(code as *const c_char).to_bytes().len();
    let name = CStr::from_ptr(name).to_string_lossy().into_owned();

    with_state(slot, |s| {
        s.journal.push(SimCall::CreateKernel {
            name: name.clone(),
            code_len,
        });
        if s.options.reject_kernels || code_len == 0 || s.kernels.len() >= INDEX_MASK {
            return std::ptr::null_mut();
        }
        s.kernels.push(SimKernel { name, queue: Vec::new() });
        handle(slot, Some(s.kernels.len() - 1))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Run `f` on the kernel behind `raw`; `None` for handles no live instance issued.
fn with_kernel<R>(raw: OkraKernel, f: impl FnOnce(&mut SimKernel, &mut Vec<SimCall>, &SimOptions) -> R) -> Option<R> {
    let (slot, index) = decode(raw)?;
    let index = index?;
    with_state(slot, |s| {
        let SimState {
            options,
            journal,
            kernels,
        } = s;
        let kernel = kernels.get_mut(index)?;
        Some(f(kernel, journal, options))
    })
    .flatten()
}

fn push(raw: OkraKernel, arg: SimArg) -> bool {
    with_kernel(raw, |k, journal, options| {
        journal.push(SimCall::Push {
            kernel: k.name.clone(),
            arg,
        });
        if options.fail_push_at == Some(k.queue.len()) {
            return false;
        }
        k.queue.push(arg);
        true
    })
    .unwrap_or(false)
}

unsafe extern "C" fn sim_push_object(k: OkraKernel, obj: *mut c_void) -> bool {
    push(k, SimArg::Object(obj as usize))
}

unsafe extern "C" fn sim_push_boolean(k: OkraKernel, v: u8) -> bool {
    push(k, SimArg::Boolean(v != 0))
}

unsafe extern "C" fn sim_push_byte(k: OkraKernel, v: i8) -> bool {
    push(k, SimArg::Byte(v))
}

unsafe extern "C" fn sim_push_double(k: OkraKernel, v: f64) -> bool {
    push(k, SimArg::Double(v))
}

unsafe extern "C" fn sim_push_float(k: OkraKernel, v: f32) -> bool {
    push(k, SimArg::Float(v))
}

unsafe extern "C" fn sim_push_int(k: OkraKernel, v: i32) -> bool {
    push(k, SimArg::Int(v))
}

unsafe extern "C" fn sim_push_long(k: OkraKernel, v: i64) -> bool {
    push(k, SimArg::Long(v))
}

unsafe extern "C" fn sim_clearargs(raw: OkraKernel) -> bool {
    with_kernel(raw, |k, journal, options| {
        journal.push(SimCall::ClearArgs { kernel: k.name.clone() });
        if options.fail_clear {
            return false;
        }
        k.queue.clear();
        true
    })
    .unwrap_or(false)
}

unsafe extern "C" fn sim_execute_with_range(raw: OkraKernel, dim_x: i32) -> bool {
    with_kernel(raw, |k, journal, options| {
        journal.push(SimCall::Execute {
            kernel: k.name.clone(),
            dim_x,
            args: k.queue.clone(),
        });
        dim_x > 0 && !options.fail_execute
    })
    .unwrap_or(false)
}
