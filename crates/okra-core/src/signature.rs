//! Kernel calling-convention descriptors.
//!
//! A `KernelSignature` is parsed once from a JVM-style method descriptor such
//! as `(IDLjava/lang/Object;Z)V` and then reused for every launch of that
//! kernel. Each parameter slot maps to exactly one backend push entry point.

use std::fmt;

use crate::error::BridgeError;
use crate::Result;

/// Kind of a single parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Object or array reference (`L...;` or `[...`)
    Object,
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `S`, pushed as a widened int
    Short,
    /// `C`, pushed as a zero-extended int
    Char,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
}

/// Backend push entry point that carries a parameter kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushFn {
    Object,
    Boolean,
    Byte,
    Int,
    Long,
    Float,
    Double,
}

impl ParamKind {
    /// The push entry point used for this slot. Narrow integers ride the
    /// int push; nothing but `Long` uses the long push.
    pub fn push_fn(&self) -> PushFn {
        match self {
            ParamKind::Object => PushFn::Object,
            ParamKind::Boolean => PushFn::Boolean,
            ParamKind::Byte => PushFn::Byte,
            ParamKind::Short | ParamKind::Char | ParamKind::Int => PushFn::Int,
            ParamKind::Long => PushFn::Long,
            ParamKind::Float => PushFn::Float,
            ParamKind::Double => PushFn::Double,
        }
    }

    fn from_base_type(c: char) -> Option<Self> {
        Some(match c {
            'Z' => ParamKind::Boolean,
            'B' => ParamKind::Byte,
            'S' => ParamKind::Short,
            'C' => ParamKind::Char,
            'I' => ParamKind::Int,
            'J' => ParamKind::Long,
            'F' => ParamKind::Float,
            'D' => ParamKind::Double,
            _ => return None,
        })
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Object => write!(f, "object"),
            ParamKind::Boolean => write!(f, "boolean"),
            ParamKind::Byte => write!(f, "byte"),
            ParamKind::Short => write!(f, "short"),
            ParamKind::Char => write!(f, "char"),
            ParamKind::Int => write!(f, "int"),
            ParamKind::Long => write!(f, "long"),
            ParamKind::Float => write!(f, "float"),
            ParamKind::Double => write!(f, "double"),
        }
    }
}

/// Parameter layout of a compiled kernel method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSignature {
    params: Vec<ParamKind>,
    has_receiver: bool,
    returns: Option<ParamKind>,
}

impl KernelSignature {
    /// Build a void signature directly from parameter kinds.
    pub fn void(params: impl Into<Vec<ParamKind>>, has_receiver: bool) -> Self {
        Self {
            params: params.into(),
            has_receiver,
            returns: None,
        }
    }

    /// Parse a method descriptor. Instance methods (`is_static == false`)
    /// get a leading receiver slot pushed as an object.
    pub fn parse(descriptor: &str, is_static: bool) -> Result<Self> {
        let invalid = |reason: &str| BridgeError::InvalidSignature {
            descriptor: descriptor.to_string(),
            reason: reason.to_string(),
        };

        let mut chars = descriptor.chars().peekable();
        if chars.next() != Some('(') {
            return Err(invalid("missing '('"));
        }

        let mut params = Vec::new();
        loop {
            match chars.peek() {
                Some(')') => {
                    chars.next();
                    break;
                }
                Some(_) => params.push(parse_field(&mut chars).map_err(|r| invalid(r))?),
                None => return Err(invalid("missing ')'")),
            }
        }

        let returns = match chars.peek() {
            Some('V') => {
                chars.next();
                None
            }
            Some(_) => Some(parse_field(&mut chars).map_err(|r| invalid(r))?),
            None => return Err(invalid("missing return type")),
        };

        if chars.next().is_some() {
            return Err(invalid("trailing characters after return type"));
        }

        Ok(Self {
            params,
            has_receiver: !is_static,
            returns,
        })
    }

    /// Declared parameters, excluding the receiver.
    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }

    pub fn has_receiver(&self) -> bool {
        self.has_receiver
    }

    /// Return kind, `None` for void.
    pub fn returns(&self) -> Option<ParamKind> {
        self.returns
    }

    pub fn is_void(&self) -> bool {
        self.returns.is_none()
    }

    /// Number of values a caller must supply, receiver included.
    pub fn arity(&self) -> usize {
        self.params.len() + usize::from(self.has_receiver)
    }

    /// Slot kinds in push order, receiver first.
    pub fn slots(&self) -> impl Iterator<Item = ParamKind> + '_ {
        self.has_receiver
            .then_some(ParamKind::Object)
            .into_iter()
            .chain(self.params.iter().copied())
    }
}

fn parse_field(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> std::result::Result<ParamKind, &'static str> {
    match chars.next() {
        Some('L') => {
            // class name up to ';'
            let mut empty = true;
            loop {
                match chars.next() {
                    Some(';') if !empty => return Ok(ParamKind::Object),
                    Some(';') => return Err("empty class name"),
                    Some(_) => empty = false,
                    None => return Err("unterminated class name"),
                }
            }
        }
        Some('[') => {
            parse_field(chars)?;
            Ok(ParamKind::Object)
        }
        Some('V') => Err("void is only valid as a return type"),
        Some(c) => ParamKind::from_base_type(c).ok_or("unknown type character"),
        None => Err("unexpected end of descriptor"),
    }
}
