// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Dynamically typed attribute values.
//!
//! [`Variant`] holds either nothing, one scalar of a fixed set of kinds, or a
//! homogeneous [`VariantArray`]. [`DataValue`] wraps a variant with its status
//! and timestamps, exactly as reads and data-change notifications deliver it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConversionError;
use crate::types::{LocalizedText, NodeId, QualifiedName, StatusCode};

// =============================================================================
// VariantKind
// =============================================================================

/// The scalar kind carried by a [`Variant`] or by each element of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    /// bool
    Boolean,
    /// i8
    SByte,
    /// u8
    Byte,
    /// i16
    Int16,
    /// u16
    UInt16,
    /// i32
    Int32,
    /// u32
    UInt32,
    /// i64
    Int64,
    /// u64
    UInt64,
    /// f32
    Float,
    /// f64
    Double,
    /// UTF-8 string
    String,
    /// UTC timestamp
    DateTime,
    /// GUID
    Guid,
    /// Status code
    StatusCode,
    /// Raw bytes
    ByteString,
    /// Node id
    NodeId,
    /// Qualified name
    QualifiedName,
    /// Localized text
    LocalizedText,
    /// Anything the client does not decode
    Complex,
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

// =============================================================================
// Variant
// =============================================================================

/// A dynamically typed value.
///
/// `is_scalar()` and `is_array()` are mutually exclusive; both are false for
/// [`Variant::Empty`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Variant {
    /// No value.
    #[default]
    Empty,
    /// Boolean.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// Single precision float.
    Float(f32),
    /// Double precision float.
    Double(f64),
    /// String.
    String(String),
    /// Timestamp.
    DateTime(DateTime<Utc>),
    /// GUID.
    Guid(Uuid),
    /// Status code.
    StatusCode(StatusCode),
    /// Byte string.
    ByteString(Vec<u8>),
    /// Node id.
    NodeId(NodeId),
    /// Qualified name.
    QualifiedName(QualifiedName),
    /// Localized text.
    LocalizedText(LocalizedText),
    /// Structured or otherwise undecoded value, kept as its debug rendering.
    Complex(String),
    /// Homogeneous array.
    Array(VariantArray),
}

impl Variant {
    /// Returns the scalar kind, or `None` for empty values and arrays.
    pub fn kind(&self) -> Option<VariantKind> {
        let kind = match self {
            Self::Empty | Self::Array(_) => return None,
            Self::Boolean(_) => VariantKind::Boolean,
            Self::SByte(_) => VariantKind::SByte,
            Self::Byte(_) => VariantKind::Byte,
            Self::Int16(_) => VariantKind::Int16,
            Self::UInt16(_) => VariantKind::UInt16,
            Self::Int32(_) => VariantKind::Int32,
            Self::UInt32(_) => VariantKind::UInt32,
            Self::Int64(_) => VariantKind::Int64,
            Self::UInt64(_) => VariantKind::UInt64,
            Self::Float(_) => VariantKind::Float,
            Self::Double(_) => VariantKind::Double,
            Self::String(_) => VariantKind::String,
            Self::DateTime(_) => VariantKind::DateTime,
            Self::Guid(_) => VariantKind::Guid,
            Self::StatusCode(_) => VariantKind::StatusCode,
            Self::ByteString(_) => VariantKind::ByteString,
            Self::NodeId(_) => VariantKind::NodeId,
            Self::QualifiedName(_) => VariantKind::QualifiedName,
            Self::LocalizedText(_) => VariantKind::LocalizedText,
            Self::Complex(_) => VariantKind::Complex,
        };
        Some(kind)
    }

    /// Returns a short type name for diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Self::Empty => "Empty".to_string(),
            Self::Array(array) => format!("Array<{}>", array.kind()),
            other => other.kind().map(|k| k.to_string()).unwrap_or_default(),
        }
    }

    /// Returns `true` for empty values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns `true` for non-empty, non-array values.
    #[inline]
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Empty | Self::Array(_))
    }

    /// Returns `true` for arrays.
    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Returns the array, if this is one.
    pub fn as_array(&self) -> Option<&VariantArray> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Widens any integer kind to `i128`.
    fn as_integer(&self) -> Option<i128> {
        match *self {
            Self::SByte(v) => Some(v.into()),
            Self::Byte(v) => Some(v.into()),
            Self::Int16(v) => Some(v.into()),
            Self::UInt16(v) => Some(v.into()),
            Self::Int32(v) => Some(v.into()),
            Self::UInt32(v) => Some(v.into()),
            Self::Int64(v) => Some(v.into()),
            Self::UInt64(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Converts to a typed value.
    pub fn to<T: FromVariant>(&self) -> Result<T, ConversionError> {
        T::from_variant(self)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("(empty)"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Guid(v) => write!(f, "{v}"),
            Self::StatusCode(v) => write!(f, "{v}"),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::NodeId(v) => write!(f, "{v}"),
            Self::QualifiedName(v) => write!(f, "{v}"),
            Self::LocalizedText(v) => write!(f, "{v}"),
            Self::Complex(v) => f.write_str(v),
            Self::Array(array) => {
                f.write_str("[")?;
                for (i, value) in array.values().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! variant_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

variant_from! {
    bool => Boolean,
    i8 => SByte,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => String,
    DateTime<Utc> => DateTime,
    Uuid => Guid,
    StatusCode => StatusCode,
    NodeId => NodeId,
    QualifiedName => QualifiedName,
    LocalizedText => LocalizedText,
    VariantArray => Array,
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

// =============================================================================
// VariantArray
// =============================================================================

/// An array whose elements all share one scalar kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantArray {
    kind: VariantKind,
    values: Vec<Variant>,
}

impl VariantArray {
    /// Creates an array, checking that every element is a scalar of `kind`.
    pub fn new(kind: VariantKind, values: Vec<Variant>) -> Result<Self, ConversionError> {
        for value in &values {
            match value.kind() {
                Some(found) if found == kind => {}
                Some(found) => {
                    return Err(ConversionError::MixedArray {
                        expected: kind.to_string(),
                        found: found.to_string(),
                    })
                }
                None if value.is_array() => return Err(ConversionError::NestedArray),
                None => {
                    return Err(ConversionError::MixedArray {
                        expected: kind.to_string(),
                        found: "Empty".to_string(),
                    })
                }
            }
        }
        Ok(Self { kind, values })
    }

    /// Creates an array, taking the kind from the first element.
    pub fn from_values(values: Vec<Variant>) -> Result<Self, ConversionError> {
        let kind = match values.first() {
            Some(first) => first.kind().ok_or(if first.is_array() {
                ConversionError::NestedArray
            } else {
                ConversionError::type_mismatch("scalar", "Empty")
            })?,
            None => VariantKind::Complex,
        };
        Self::new(kind, values)
    }

    /// The element kind.
    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    /// The elements.
    pub fn values(&self) -> &[Variant] {
        &self.values
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<u32>> for Variant {
    fn from(values: Vec<u32>) -> Self {
        Self::Array(VariantArray {
            kind: VariantKind::UInt32,
            values: values.into_iter().map(Variant::UInt32).collect(),
        })
    }
}

// =============================================================================
// FromVariant
// =============================================================================

/// Typed extraction from a [`Variant`].
///
/// Integer targets accept any integer kind whose value fits.
pub trait FromVariant: Sized {
    /// Converts the variant.
    fn from_variant(value: &Variant) -> Result<Self, ConversionError>;
}

fn mismatch(expected: &str, value: &Variant) -> ConversionError {
    ConversionError::type_mismatch(expected, value.type_name())
}

macro_rules! integer_from_variant {
    ($($ty:ty),*) => {
        $(
            impl FromVariant for $ty {
                fn from_variant(value: &Variant) -> Result<Self, ConversionError> {
                    value
                        .as_integer()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .ok_or_else(|| mismatch(stringify!($ty), value))
                }
            }
        )*
    };
}

integer_from_variant!(u8, u16, u32, i32, i64);

impl FromVariant for bool {
    fn from_variant(value: &Variant) -> Result<Self, ConversionError> {
        match value {
            Variant::Boolean(v) => Ok(*v),
            other => Err(mismatch("Boolean", other)),
        }
    }
}

impl FromVariant for f64 {
    fn from_variant(value: &Variant) -> Result<Self, ConversionError> {
        match value {
            Variant::Double(v) => Ok(*v),
            Variant::Float(v) => Ok(f64::from(*v)),
            other => other
                .as_integer()
                .map(|v| v as f64)
                .ok_or_else(|| mismatch("Double", other)),
        }
    }
}

impl FromVariant for String {
    fn from_variant(value: &Variant) -> Result<Self, ConversionError> {
        match value {
            Variant::String(v) => Ok(v.clone()),
            Variant::LocalizedText(v) => Ok(v.text.clone()),
            other => Err(mismatch("String", other)),
        }
    }
}

impl FromVariant for LocalizedText {
    fn from_variant(value: &Variant) -> Result<Self, ConversionError> {
        match value {
            Variant::LocalizedText(v) => Ok(v.clone()),
            Variant::String(v) => Ok(LocalizedText::new("", v.clone())),
            other => Err(mismatch("LocalizedText", other)),
        }
    }
}

impl FromVariant for QualifiedName {
    fn from_variant(value: &Variant) -> Result<Self, ConversionError> {
        match value {
            Variant::QualifiedName(v) => Ok(v.clone()),
            Variant::String(v) => Ok(QualifiedName::new(0, v.clone())),
            other => Err(mismatch("QualifiedName", other)),
        }
    }
}

impl FromVariant for NodeId {
    fn from_variant(value: &Variant) -> Result<Self, ConversionError> {
        match value {
            Variant::NodeId(v) => Ok(v.clone()),
            other => Err(mismatch("NodeId", other)),
        }
    }
}

impl FromVariant for Vec<u32> {
    fn from_variant(value: &Variant) -> Result<Self, ConversionError> {
        match value {
            Variant::Array(array) => array.values().iter().map(u32::from_variant).collect(),
            other => Err(mismatch("Array<UInt32>", other)),
        }
    }
}

impl FromVariant for Variant {
    fn from_variant(value: &Variant) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

// =============================================================================
// DataValue
// =============================================================================

/// A value together with its status and timestamps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataValue {
    /// The value.
    pub value: Variant,
    /// Outcome reported with the value.
    pub status: StatusCode,
    /// When the source produced the value.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Sub-tick precision of the source timestamp.
    pub source_picoseconds: u16,
    /// When the server observed the value.
    pub server_timestamp: Option<DateTime<Utc>>,
    /// Sub-tick precision of the server timestamp.
    pub server_picoseconds: u16,
}

impl DataValue {
    /// Creates a good value without timestamps.
    pub fn new(value: impl Into<Variant>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    /// Creates a good value stamped with the current time.
    pub fn new_now(value: impl Into<Variant>) -> Self {
        let now = Utc::now();
        Self {
            value: value.into(),
            source_timestamp: Some(now),
            server_timestamp: Some(now),
            ..Default::default()
        }
    }

    /// Creates a value-less result carrying only a status.
    pub fn from_status(status: StatusCode) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Returns `true` when the status is good.
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }
}

// =============================================================================
// Tests
// =============================================================================
