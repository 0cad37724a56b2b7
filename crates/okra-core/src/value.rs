use std::fmt;

use crate::signature::ParamKind;

/// Address of a host object on the managed heap, as seen by device code.
///
/// Stored as an integer so argument lists stay `Send`; converted to a raw
/// pointer only at the push boundary. Zero is the null reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectRef(usize);

impl ObjectRef {
    pub const NULL: ObjectRef = ObjectRef(0);

    pub fn from_addr(addr: usize) -> Self {
        ObjectRef(addr)
    }

    pub fn from_ptr<T>(ptr: *const T) -> Self {
        ObjectRef(ptr as usize)
    }

    pub fn addr(&self) -> usize {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub fn as_ptr(&self) -> *mut std::ffi::c_void {
        self.0 as *mut std::ffi::c_void
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "@{:#x}", self.0)
        }
    }
}

/// One kernel argument in VM calling order.
///
/// The backend queue is positional, so a list of these is pushed front to
/// back with exactly one push entry point per variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgumentValue {
    Object(ObjectRef),
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl ArgumentValue {
    /// The parameter kind this value can occupy.
    pub fn kind(&self) -> ParamKind {
        match self {
            ArgumentValue::Object(_) => ParamKind::Object,
            ArgumentValue::Boolean(_) => ParamKind::Boolean,
            ArgumentValue::Byte(_) => ParamKind::Byte,
            ArgumentValue::Short(_) => ParamKind::Short,
            ArgumentValue::Char(_) => ParamKind::Char,
            ArgumentValue::Int(_) => ParamKind::Int,
            ArgumentValue::Long(_) => ParamKind::Long,
            ArgumentValue::Float(_) => ParamKind::Float,
            ArgumentValue::Double(_) => ParamKind::Double,
        }
    }

    /// The object reference, if this is an object argument.
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            ArgumentValue::Object(r) => Some(*r),
            _ => None,
        }
    }
}

impl fmt::Display for ArgumentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentValue::Object(r) => write!(f, "object {r}"),
            ArgumentValue::Boolean(v) => write!(f, "boolean {v}"),
            ArgumentValue::Byte(v) => write!(f, "byte {v}"),
            ArgumentValue::Short(v) => write!(f, "short {v}"),
            ArgumentValue::Char(v) => write!(f, "char {v}"),
            ArgumentValue::Int(v) => write!(f, "int {v}"),
            ArgumentValue::Long(v) => write!(f, "long {v}"),
            ArgumentValue::Float(v) => write!(f, "float {v}"),
            ArgumentValue::Double(v) => write!(f, "double {v}"),
        }
    }
}

impl From<ObjectRef> for ArgumentValue {
    fn from(v: ObjectRef) -> Self {
        ArgumentValue::Object(v)
    }
}

impl From<bool> for ArgumentValue {
    fn from(v: bool) -> Self {
        ArgumentValue::Boolean(v)
    }
}

impl From<i8> for ArgumentValue {
    fn from(v: i8) -> Self {
        ArgumentValue::Byte(v)
    }
}

impl From<i16> for ArgumentValue {
    fn from(v: i16) -> Self {
        ArgumentValue::Short(v)
    }
}

impl From<i32> for ArgumentValue {
    fn from(v: i32) -> Self {
        ArgumentValue::Int(v)
    }
}

impl From<i64> for ArgumentValue {
    fn from(v: i64) -> Self {
        ArgumentValue::Long(v)
    }
}

impl From<f32> for ArgumentValue {
    fn from(v: f32) -> Self {
        ArgumentValue::Float(v)
    }
}

impl From<f64> for ArgumentValue {
    fn from(v: f64) -> Self {
        ArgumentValue::Double(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref() {
        assert!(ObjectRef::NULL.is_null());
        assert!(ObjectRef::default().is_null());
        let r = ObjectRef::from_addr(0x1000);
        assert!(!r.is_null());
        assert_eq!(r.addr(), 0x1000);
        assert_eq!(r.as_ptr() as usize, 0x1000);
        assert_eq!(format!("{}", r), "@0x1000");
        assert_eq!(format!("{}", ObjectRef::NULL), "null");
    }

    #[test]
    fn test_kind_of_each_variant() {
        assert_eq!(ArgumentValue::from(ObjectRef::NULL).kind(), ParamKind::Object);
        assert_eq!(ArgumentValue::from(true).kind(), ParamKind::Boolean);
        assert_eq!(ArgumentValue::from(1i8).kind(), ParamKind::Byte);
        assert_eq!(ArgumentValue::from(1i16).kind(), ParamKind::Short);
        assert_eq!(ArgumentValue::Char(65).kind(), ParamKind::Char);
        assert_eq!(ArgumentValue::from(1i32).kind(), ParamKind::Int);
        assert_eq!(ArgumentValue::from(1i64).kind(), ParamKind::Long);
        assert_eq!(ArgumentValue::from(1.0f32).kind(), ParamKind::Float);
        assert_eq!(ArgumentValue::from(1.0f64).kind(), ParamKind::Double);
    }

    #[test]
    fn test_as_object() {
        let r = ObjectRef::from_addr(0x40);
        assert_eq!(ArgumentValue::Object(r).as_object(), Some(r));
        assert_eq!(ArgumentValue::Int(3).as_object(), None);
    }
}
