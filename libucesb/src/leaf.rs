use std::fmt;

use super::error::{RegistryError, UnpackError};
use super::members::{EnumerateMode, EnumerateVisitor, LeafInfo, LeafVisitor, Members, PrettyPrinter};
use super::signal_id::SignalId;
use super::zero_suppress_info::ZzpWalk;

/// A leaf value in transit between mirror levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Uint(u64),
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Uint(v) => v as f64,
            Value::Int(v) => v as f64,
            Value::Float(v) => v,
        }
    }

    /// Negative values clamp to zero, floats saturate
    pub fn as_u64(&self) -> u64 {
        match *self {
            Value::Uint(v) => v,
            Value::Int(v) => v.max(0) as u64,
            Value::Float(v) => v as u64,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match *self {
            Value::Uint(v) => v.min(i64::MAX as u64) as i64,
            Value::Int(v) => v,
            Value::Float(v) => v as i64,
        }
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            Value::Uint(v) => v == 0,
            Value::Int(v) => v == 0,
            Value::Float(v) => v == 0.0,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Uint(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafKind {
    U8,
    U16,
    U32,
    U64,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl LeafKind {
    pub fn name(&self) -> &'static str {
        match self {
            LeafKind::U8 => "uint8",
            LeafKind::U16 => "uint16",
            LeafKind::U32 => "uint32",
            LeafKind::U64 => "uint64",
            LeafKind::I16 => "int16",
            LeafKind::I32 => "int32",
            LeafKind::I64 => "int64",
            LeafKind::F32 => "float",
            LeafKind::F64 => "double",
        }
    }

    /// The representable range, as reported to schema builders
    pub fn range(&self) -> (Value, Value) {
        match self {
            LeafKind::U8 => (Value::Uint(0), Value::Uint(u8::MAX as u64)),
            LeafKind::U16 => (Value::Uint(0), Value::Uint(u16::MAX as u64)),
            LeafKind::U32 => (Value::Uint(0), Value::Uint(u32::MAX as u64)),
            LeafKind::U64 => (Value::Uint(0), Value::Uint(u64::MAX)),
            LeafKind::I16 => (Value::Int(i16::MIN as i64), Value::Int(i16::MAX as i64)),
            LeafKind::I32 => (Value::Int(i32::MIN as i64), Value::Int(i32::MAX as i64)),
            LeafKind::I64 => (Value::Int(i64::MIN), Value::Int(i64::MAX)),
            LeafKind::F32 => (Value::Float(f32::MIN as f64), Value::Float(f32::MAX as f64)),
            LeafKind::F64 => (Value::Float(f64::MIN), Value::Float(f64::MAX)),
        }
    }
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A terminal member holding a single value.
///
/// This is the type-erased handle the mapping and calibration layers write through
/// once a destination has been located.
pub trait Leaf {
    fn kind(&self) -> LeafKind;
    fn value(&self) -> Value;
    fn set_value(&mut self, value: Value);
}

macro_rules! impl_leaf {
    ($t:ty, $kind:ident, $to:ident, $from:expr) => {
        impl Leaf for $t {
            fn kind(&self) -> LeafKind {
                LeafKind::$kind
            }

            fn value(&self) -> Value {
                Value::$to((*self).into())
            }

            fn set_value(&mut self, value: Value) {
                let convert: fn(Value) -> $t = $from;
                *self = convert(value);
            }
        }

        impl Members for $t {
            fn leaf_count(&self) -> usize {
                1
            }

            fn clean(&mut self) {
                *self = <$t>::default();
            }

            fn dump(&self, id: &SignalId, pp: &mut PrettyPrinter) {
                pp.line(id, self.value());
            }

            fn show_members(&self, id: &SignalId, unit: Option<&'static str>, pp: &mut PrettyPrinter) {
                match unit {
                    Some(u) => pp.line(id, format_args!("{} [{u}]", LeafKind::$kind)),
                    None => pp.line(id, LeafKind::$kind),
                }
            }

            fn enumerate_members(
                &self,
                id: &SignalId,
                flat: usize,
                _mode: EnumerateMode,
                unit: Option<&'static str>,
                visitor: &mut dyn EnumerateVisitor,
            ) {
                let (min, max) = LeafKind::$kind.range();
                visitor.leaf(&LeafInfo {
                    id,
                    flat,
                    kind: LeafKind::$kind,
                    min,
                    max,
                    unit,
                });
            }

            fn zero_suppress_info_ptrs(&self, walk: &mut ZzpWalk<'_>) -> Result<(), RegistryError> {
                walk.register_leaf()
            }

            fn visit_valid(&self, flat: usize, visitor: &mut dyn LeafVisitor) -> Result<(), UnpackError> {
                visitor.visit(flat, self)
            }

            fn locate_mut(&mut self, route: &[usize]) -> Result<&mut dyn Leaf, UnpackError> {
                if route.is_empty() {
                    Ok(self)
                } else {
                    Err(UnpackError::BadRoute(route.to_vec()))
                }
            }
        }
    };
}

impl_leaf!(u8, U8, Uint, |v| v.as_u64().min(u8::MAX as u64) as u8);
impl_leaf!(u16, U16, Uint, |v| v.as_u64().min(u16::MAX as u64) as u16);
impl_leaf!(u32, U32, Uint, |v| v.as_u64().min(u32::MAX as u64) as u32);
impl_leaf!(u64, U64, Uint, |v| v.as_u64());
impl_leaf!(i16, I16, Int, |v| v.as_i64().clamp(i16::MIN as i64, i16::MAX as i64) as i16);
impl_leaf!(i32, I32, Int, |v| v.as_i64().clamp(i32::MIN as i64, i32::MAX as i64) as i32);
impl_leaf!(i64, I64, Int, |v| v.as_i64());
impl_leaf!(f32, F32, Float, |v| v.as_f64() as f32);
impl_leaf!(f64, F64, Float, |v| v.as_f64());
