use crate::error::BridgeError;
use crate::Result;

/// Compiled device code handed over by the JIT, plus its display name.
///
/// Borrowed: the JIT keeps ownership of the artifact. The okra create call
/// takes no length, so code that does not already end in NUL is copied once
/// into a terminated temporary for that call; terminated code is passed as
/// is. The bridge does not look inside the code; validating it is the
/// backend's job.
#[derive(Debug, Clone, Copy)]
pub struct KernelBinary<'a> {
    code: &'a [u8],
    name: &'a str,
}

impl<'a> KernelBinary<'a> {
    /// Wrap a code buffer. Empty code and names containing NUL are rejected
    /// since neither can cross the C boundary intact.
    pub fn new(code: &'a [u8], name: &'a str) -> Result<Self> {
        if code.is_empty() {
            return Err(BridgeError::InvalidKernel(format!("'{}' has empty code", name)));
        }
        if name.contains('\0') {
            return Err(BridgeError::InvalidKernel(format!(
                "name {:?} contains a NUL byte",
                name
            )));
        }
        Ok(Self { code, name })
    }

    pub fn code(&self) -> &'a [u8] {
        self.code
    }

    pub fn code_len(&self) -> usize {
        self.code.len()
    }

    pub fn name(&self) -> &'a str {
        self.name
    }
}
