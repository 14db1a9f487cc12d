//! SSA Type System
//!
//! Defines the types attached to SSA names. Types record a MATLAB numeric
//! class plus whatever is statically known about the value's shape. A name
//! missing from a function's type map is simply untyped, so there is no
//! explicit unknown variant here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// MATLAB numeric class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericClass {
    Double,
    Single,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Logical,
}

impl NumericClass {
    pub fn name(&self) -> &'static str {
        match self {
            NumericClass::Double => "double",
            NumericClass::Single => "single",
            NumericClass::Int8 => "int8",
            NumericClass::Int16 => "int16",
            NumericClass::Int32 => "int32",
            NumericClass::Int64 => "int64",
            NumericClass::UInt8 => "uint8",
            NumericClass::UInt16 => "uint16",
            NumericClass::UInt32 => "uint32",
            NumericClass::UInt64 => "uint64",
            NumericClass::Logical => "logical",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            NumericClass::Int8
                | NumericClass::Int16
                | NumericClass::Int32
                | NumericClass::Int64
                | NumericClass::UInt8
                | NumericClass::UInt16
                | NumericClass::UInt32
                | NumericClass::UInt64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, NumericClass::Double | NumericClass::Single)
    }
}

impl fmt::Display for NumericClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Statically known shape information
///
/// `None` dims means even the rank is unknown. A known rank carries one
/// entry per dimension, each either a known extent or `None`. MATLAB shapes
/// always have at least two dimensions; a scalar is 1x1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Option<Vec<Option<usize>>>,
}

impl Shape {
    pub fn unknown() -> Self {
        Self { dims: None }
    }

    pub fn scalar() -> Self {
        Self {
            dims: Some(vec![Some(1), Some(1)]),
        }
    }

    pub fn empty() -> Self {
        Self {
            dims: Some(vec![Some(0), Some(0)]),
        }
    }

    /// Row vector, 1xN. `None` length means the extent is dynamic.
    pub fn row(len: Option<usize>) -> Self {
        Self {
            dims: Some(vec![Some(1), len]),
        }
    }

    /// Column vector, Nx1.
    pub fn column(len: Option<usize>) -> Self {
        Self {
            dims: Some(vec![len, Some(1)]),
        }
    }

    pub fn matrix(dims: Vec<Option<usize>>) -> Self {
        debug_assert!(dims.len() >= 2, "MATLAB shapes have at least two dims");
        Self { dims: Some(dims) }
    }

    pub fn known(dims: &[usize]) -> Self {
        Self::matrix(dims.iter().map(|d| Some(*d)).collect())
    }

    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(|d| d.len())
    }

    pub fn dims(&self) -> Option<&[Option<usize>]> {
        self.dims.as_deref()
    }

    /// Extent of dimension `index` (zero-based), when known.
    pub fn dim(&self, index: usize) -> Option<usize> {
        match &self.dims {
            Some(dims) => dims.get(index).copied().flatten(),
            None => None,
        }
    }

    /// All extents, when every one of them is known.
    pub fn known_dims(&self) -> Option<Vec<usize>> {
        self.dims
            .as_ref()?
            .iter()
            .map(|d| *d)
            .collect::<Option<Vec<usize>>>()
    }

    pub fn is_fully_known(&self) -> bool {
        self.known_dims().is_some()
    }

    /// Number of elements. Known whenever all extents are known, and also
    /// whenever any extent is zero.
    pub fn numel(&self) -> Option<usize> {
        let dims = self.dims.as_ref()?;
        if dims.contains(&Some(0)) {
            return Some(0);
        }
        dims.iter().map(|d| *d).product::<Option<usize>>()
    }

    pub fn is_scalar(&self) -> bool {
        match &self.dims {
            Some(dims) => dims.iter().all(|d| *d == Some(1)),
            None => false,
        }
    }

    /// True when the shape is statically a row or column vector. The length
    /// itself may still be dynamic.
    pub fn is_vector(&self) -> bool {
        match &self.dims {
            Some(dims) => dims.len() == 2 && (dims[0] == Some(1) || dims[1] == Some(1)),
            None => false,
        }
    }

    pub fn is_known_empty(&self) -> bool {
        self.numel() == Some(0)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dims {
            None => write!(f, "?"),
            Some(dims) => {
                for (i, dim) in dims.iter().enumerate() {
                    if i > 0 {
                        write!(f, "x")?;
                    }
                    match dim {
                        Some(extent) => write!(f, "{}", extent)?,
                        None => write!(f, "?")?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// Type of an SSA name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatlabType {
    /// A value statically known to be 1x1
    Scalar(NumericClass),

    /// A matrix of the given class with whatever shape knowledge we have
    Matrix { class: NumericClass, shape: Shape },
}

impl MatlabType {
    pub fn double() -> Self {
        MatlabType::Scalar(NumericClass::Double)
    }

    /// Type used for synthesized counters and indices.
    pub fn int() -> Self {
        MatlabType::Scalar(NumericClass::Int32)
    }

    pub fn logical() -> Self {
        MatlabType::Scalar(NumericClass::Logical)
    }

    pub fn matrix(class: NumericClass, shape: Shape) -> Self {
        MatlabType::Matrix { class, shape }
    }

    pub fn double_matrix(shape: Shape) -> Self {
        MatlabType::Matrix {
            class: NumericClass::Double,
            shape,
        }
    }

    pub fn class(&self) -> NumericClass {
        match self {
            MatlabType::Scalar(class) => *class,
            MatlabType::Matrix { class, .. } => *class,
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            MatlabType::Scalar(_) => Shape::scalar(),
            MatlabType::Matrix { shape, .. } => shape.clone(),
        }
    }

    /// The scalar type of one element of this value.
    pub fn element(&self) -> MatlabType {
        MatlabType::Scalar(self.class())
    }

    pub fn is_scalar(&self) -> bool {
        match self {
            MatlabType::Scalar(_) => true,
            MatlabType::Matrix { shape, .. } => shape.is_scalar(),
        }
    }

    pub fn is_known_vector(&self) -> bool {
        match self {
            MatlabType::Scalar(_) => true,
            MatlabType::Matrix { shape, .. } => shape.is_vector(),
        }
    }

    pub fn is_known_empty(&self) -> bool {
        match self {
            MatlabType::Scalar(_) => false,
            MatlabType::Matrix { shape, .. } => shape.is_known_empty(),
        }
    }

    pub fn numel(&self) -> Option<usize> {
        match self {
            MatlabType::Scalar(_) => Some(1),
            MatlabType::Matrix { shape, .. } => shape.numel(),
        }
    }
}

impl fmt::Display for MatlabType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatlabType::Scalar(class) => write!(f, "{}", class),
            MatlabType::Matrix { class, shape } => write!(f, "{} {}", class, shape),
        }
    }
}

/// Signature of a resolved call target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub inputs: Vec<MatlabType>,
    pub outputs: Vec<MatlabType>,
}

impl FunctionType {
    pub fn new(inputs: Vec<MatlabType>, outputs: Vec<MatlabType>) -> Self {
        Self { inputs, outputs }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, input) in self.inputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", input)?;
        }
        write!(f, ") -> (")?;
        for (i, output) in self.outputs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", output)?;
        }
        write!(f, ")")
    }
}
