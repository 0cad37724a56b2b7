//! Kernel launch over a 1-D range.

use std::time::Instant;

use okra_core::{BridgeError, LaunchRange, Result};

use crate::kernel::Kernel;

/// Run the kernel with whatever arguments are queued.
///
/// Blocking; there is no timeout at this layer. A stuck device keeps the
/// calling thread blocked unless the backend enforces its own limit.
pub(crate) fn execute_with_range(kernel: &mut Kernel<'_>, range: LaunchRange) -> Result<()> {
    let start = Instant::now();
    let ok = unsafe { (kernel.context().api().execute_with_range)(kernel.as_raw(), range.dim_x()) };
    let elapsed = start.elapsed();

    if !ok {
        tracing::warn!("kernel '{}' failed over {} after {:?}", kernel.name(), range, elapsed);
        return Err(BridgeError::Execution {
            kernel: kernel.name().to_string(),
        });
    }

    kernel.record_launch();
    tracing::debug!("kernel '{}' ran over {} in {:?}", kernel.name(), range, elapsed);
    Ok(())
}
