//! Argument marshaling into the okra push queue.
//!
//! The queue is positional and keeps state between launches, so every
//! launch runs: validate (no backend calls) -> clearargs -> one push per slot
//! in declaration order -> execute. The first failing step ends the launch;
//! a launch that fails before execute never ran on the device.

use okra_core::{
    ArgumentValue, BridgeError, HeapRegion, KernelSignature, LaunchRange, Result,
};

use crate::kernel::Kernel;
use crate::launch;

impl Kernel<'_> {
    /// Marshal `args` according to `signature` and run over `dim_x` work-items.
    ///
    /// Blocks until the device reports completion or failure.
    pub fn execute_void_1d(
        &mut self,
        dim_x: i32,
        args: &[ArgumentValue],
        signature: &KernelSignature,
    ) -> Result<()> {
        let range = LaunchRange::new_1d(dim_x)?;
        if !signature.is_void() {
            return Err(BridgeError::UnsupportedSignature(format!(
                "kernel '{}' returns a value; only void kernels can be launched",
                self.name()
            )));
        }
        let heap = self.context().registered_heap().ok_or(BridgeError::HeapNotRegistered)?;
        validate(signature, args, heap, self.context().verify_object_refs())?;

        self.clear_args()?;
        for (index, value) in args.iter().enumerate() {
            self.push(index, value)?;
        }
        launch::execute_with_range(self, range)
    }

    fn clear_args(&mut self) -> Result<()> {
        if unsafe { (self.context().api().clearargs)(self.as_raw()) } {
            Ok(())
        } else {
            Err(BridgeError::ClearArgs {
                kernel: self.name().to_string(),
            })
        }
    }

    fn push(&mut self, index: usize, value: &ArgumentValue) -> Result<()> {
        let api = self.context().api();
        let k = self.as_raw();
        let pushed = unsafe {
            match *value {
                ArgumentValue::Object(r) => (api.push_object)(k, r.as_ptr()),
                ArgumentValue::Boolean(v) => (api.push_boolean)(k, u8::from(v)),
                ArgumentValue::Byte(v) => (api.push_byte)(k, v),
                ArgumentValue::Short(v) => (api.push_int)(k, i32::from(v)),
                ArgumentValue::Char(v) => (api.push_int)(k, i32::from(v)),
                ArgumentValue::Int(v) => (api.push_int)(k, v),
                ArgumentValue::Long(v) => (api.push_long)(k, v),
                ArgumentValue::Float(v) => (api.push_float)(k, v),
                ArgumentValue::Double(v) => (api.push_double)(k, v),
            }
        };
        if pushed {
            Ok(())
        } else {
            tracing::warn!("kernel '{}': push of argument {} ({}) failed", self.name(), index, value);
            Err(BridgeError::ArgumentPush {
                index,
                kind: value.kind(),
            })
        }
    }
}

/// Check `args` against the signature before anything reaches the backend.
pub fn validate(
    signature: &KernelSignature,
    args: &[ArgumentValue],
    heap: HeapRegion,
    verify_object_refs: bool,
) -> Result<()> {
    if args.len() != signature.arity() {
        return Err(BridgeError::ArgumentCount {
            expected: signature.arity(),
            found: args.len(),
        });
    }

    for (index, (expected, value)) in signature.slots().zip(args).enumerate() {
        let found = value.kind();
        if found != expected {
            return Err(BridgeError::ArgumentMismatch { index, expected, found });
        }
        if let Some(obj) = value.as_object() {
            if index == 0 && signature.has_receiver() && obj.is_null() {
                return Err(BridgeError::NullReceiver);
            }
            if verify_object_refs && !obj.is_null() && !heap.contains(obj.addr()) {
                return Err(BridgeError::UnregisteredObject {
                    index,
                    addr: obj.addr(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use okra_core::{ObjectRef, ParamKind};

    const HEAP: HeapRegion = HeapRegion { base: 0x1000, size: 0x1000 };

    fn sig(descriptor: &str) -> KernelSignature {
        KernelSignature::parse(descriptor, true).unwrap()
    }

    #[test]
    fn test_validate_ok() {
        let args = [
            ArgumentValue::Int(7),
            ArgumentValue::Double(0.5),
            ArgumentValue::Object(ObjectRef::from_addr(0x1800)),
            ArgumentValue::Boolean(true),
        ];
        validate(&sig("(IDLjava/lang/Object;Z)V"), &args, HEAP, true).unwrap();
    }

    #[test]
    fn test_validate_count() {
        let err = validate(&sig("(II)V"), &[ArgumentValue::Int(1)], HEAP, true).unwrap_err();
        assert!(matches!(err, BridgeError::ArgumentCount { expected: 2, found: 1 }));
    }

    #[test]
    fn test_validate_rejects_widening_mismatch() {
        // an int slot never takes a long, even if the value would fit
        let err = validate(&sig("(I)V"), &[ArgumentValue::Long(1)], HEAP, true).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ArgumentMismatch { index: 0, expected: ParamKind::Int, found: ParamKind::Long }
        ));
    }

    #[test]
    fn test_validate_null_object_allowed() {
        validate(&sig("([F)V"), &[ArgumentValue::Object(ObjectRef::NULL)], HEAP, true).unwrap();
    }

    #[test]
    fn test_validate_null_receiver() {
        let s = KernelSignature::parse("(I)V", false).unwrap();
        let err = validate(&s, &[ArgumentValue::Object(ObjectRef::NULL), ArgumentValue::Int(3)], HEAP, true).unwrap_err();
        assert!(matches!(err, BridgeError::NullReceiver));
    }

    #[test]
    fn test_validate_unregistered_object() {
        let args = [ArgumentValue::Object(ObjectRef::from_addr(0x9000))];
        let err = validate(&sig("([I)V"), &args, HEAP, true).unwrap_err();
        assert!(matches!(err, BridgeError::UnregisteredObject { index: 0, addr: 0x9000 }));
        validate(&sig("([I)V"), &args, HEAP, false).unwrap();
    }
}
