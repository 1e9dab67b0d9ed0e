//! Typed N-dimensional value arrays held by dataset fields.
//!
//! A field stores exactly one of four element types. Operations that combine
//! arrays of different types promote along `Bool -> Int64 -> Float64 ->
//! Complex128`.

use ndarray::{concatenate, Array, ArrayD, Axis, Dimension, IxDyn, Slice};
use num_complex::Complex64;

use crate::error::{DataDictError, Result};
use crate::num::{arrays_equal, DEFAULT_RTOL};

/// Element type of a [`Values`] array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DType {
    Bool,
    Int64,
    Float64,
    Complex128,
}

impl DType {
    /// Name of the type as used in stored attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Complex128 => "complex128",
        }
    }

    /// Smallest type both inputs can be cast to without loss of kind.
    pub fn promote(self, other: Self) -> Self {
        self.max(other)
    }

    /// Whether the type can hold invalid (NaN) markers.
    pub fn holds_invalid(&self) -> bool {
        matches!(self, Self::Float64 | Self::Complex128)
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An N-dimensional array of one of the supported element types.
#[derive(Debug, Clone)]
pub enum Values {
    Float(ArrayD<f64>),
    Complex(ArrayD<Complex64>),
    Int(ArrayD<i64>),
    Bool(ArrayD<bool>),
}

/// Apply an expression to the inner array and re-wrap it in the same variant.
macro_rules! map_values {
    ($values:expr, $arr:ident => $body:expr) => {
        match $values {
            Values::Float($arr) => Values::Float($body),
            Values::Complex($arr) => Values::Complex($body),
            Values::Int($arr) => Values::Int($body),
            Values::Bool($arr) => Values::Bool($body),
        }
    };
}

/// Evaluate an expression on the inner array, whatever its element type.
macro_rules! with_values {
    ($values:expr, $arr:ident => $body:expr) => {
        match $values {
            Values::Float($arr) => $body,
            Values::Complex($arr) => $body,
            Values::Int($arr) => $body,
            Values::Bool($arr) => $body,
        }
    };
}

impl Default for Values {
    fn default() -> Self {
        Self::empty(DType::Float64, &[])
    }
}

impl Values {
    /// An array with zero records and the given inner shape.
    pub fn empty(dtype: DType, inner_shape: &[usize]) -> Self {
        let mut shape = vec![0];
        shape.extend_from_slice(inner_shape);
        let dim = IxDyn(&shape);
        match dtype {
            DType::Float64 => Self::Float(ArrayD::from_elem(dim, 0.0)),
            DType::Complex128 => Self::Complex(ArrayD::from_elem(dim, Complex64::new(0.0, 0.0))),
            DType::Int64 => Self::Int(ArrayD::from_elem(dim, 0)),
            DType::Bool => Self::Bool(ArrayD::from_elem(dim, false)),
        }
    }

    /// Array filled with invalid entries. Types that cannot hold NaN become float.
    pub fn invalid(dtype: DType, shape: &[usize]) -> Self {
        let dim = IxDyn(shape);
        match dtype {
            DType::Complex128 => {
                Self::Complex(ArrayD::from_elem(dim, Complex64::new(f64::NAN, f64::NAN)))
            }
            _ => Self::Float(ArrayD::from_elem(dim, f64::NAN)),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Self::Float(_) => DType::Float64,
            Self::Complex(_) => DType::Complex128,
            Self::Int(_) => DType::Int64,
            Self::Bool(_) => DType::Bool,
        }
    }

    pub fn shape(&self) -> &[usize] {
        with_values!(self, a => a.shape())
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        with_values!(self, a => a.len())
    }

    /// Length of the outermost (record) dimension; 1 for a 0-d array.
    pub fn nrows(&self) -> usize {
        self.shape().first().copied().unwrap_or(1)
    }

    /// Shape of a single record, i.e. everything but the outermost dimension.
    pub fn inner_shape(&self) -> &[usize] {
        let shape = self.shape();
        if shape.is_empty() {
            shape
        } else {
            &shape[1..]
        }
    }

    /// Reshape to `shape`; the number of elements must not change.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != self.size() {
            return Err(DataDictError::Shape(format!(
                "cannot reshape array of size {} into shape {:?}",
                self.size(),
                shape
            )));
        }
        Ok(map_values!(self, a => reshape_array(a, shape)?))
    }

    /// Row-major flattened 1-D copy.
    pub fn flatten(&self) -> Self {
        map_values!(self, a => Array::from_iter(a.iter().cloned()).into_dyn())
    }

    /// Permute dimensions; `perm[i]` is the old dimension that becomes dimension `i`.
    pub fn transpose(&self, perm: &[usize]) -> Result<Self> {
        let ndim = self.ndim();
        let mut seen = vec![false; ndim];
        for &p in perm {
            if p >= ndim || seen[p] {
                return Err(DataDictError::Shape(format!(
                    "{perm:?} is not a permutation of {ndim} dimensions"
                )));
            }
            seen[p] = true;
        }
        if perm.len() != ndim {
            return Err(DataDictError::Shape(format!(
                "{perm:?} is not a permutation of {ndim} dimensions"
            )));
        }
        Ok(map_values!(self, a => a
            .clone()
            .permuted_axes(IxDyn(perm))
            .as_standard_layout()
            .into_owned()))
    }

    /// Records `start..stop` (clamped to the available rows).
    pub fn slice_rows(&self, start: usize, stop: usize) -> Self {
        let nrows = if self.ndim() == 0 { 0 } else { self.nrows() };
        let stop = stop.min(nrows);
        let start = start.min(stop);
        if self.ndim() == 0 {
            return self.clone();
        }
        map_values!(self, a => a.slice_axis(Axis(0), Slice::from(start..stop)).to_owned())
    }

    /// Pick `indices` along dimension `axis`.
    pub fn select(&self, axis: usize, indices: &[usize]) -> Result<Self> {
        if axis >= self.ndim() {
            return Err(DataDictError::Shape(format!(
                "axis {axis} out of range for {}-d array",
                self.ndim()
            )));
        }
        let extent = self.shape()[axis];
        if let Some(bad) = indices.iter().find(|&&i| i >= extent) {
            return Err(DataDictError::Shape(format!(
                "index {bad} out of range for dimension {axis} with extent {extent}"
            )));
        }
        Ok(map_values!(self, a => a.select(Axis(axis), indices)))
    }

    /// Append the records of `other` after the records of `self`.
    pub fn concat_rows(&self, other: &Values) -> Result<Self> {
        if self.inner_shape() != other.inner_shape() {
            return Err(DataDictError::Shape(format!(
                "cannot append records of shape {:?} to records of shape {:?}",
                other.inner_shape(),
                self.inner_shape()
            )));
        }
        let dtype = self.dtype().promote(other.dtype());
        let lhs = self.cast(dtype)?;
        let rhs = other.cast(dtype)?;
        let joined = match (&lhs, &rhs) {
            (Self::Float(a), Self::Float(b)) => Self::Float(concatenate(Axis(0), &[a.view(), b.view()])?),
            (Self::Complex(a), Self::Complex(b)) => {
                Self::Complex(concatenate(Axis(0), &[a.view(), b.view()])?)
            }
            (Self::Int(a), Self::Int(b)) => Self::Int(concatenate(Axis(0), &[a.view(), b.view()])?),
            (Self::Bool(a), Self::Bool(b)) => Self::Bool(concatenate(Axis(0), &[a.view(), b.view()])?),
            _ => {
                return Err(DataDictError::Shape(
                    "array types differ after promotion".to_string(),
                ))
            }
        };
        Ok(joined)
    }

    /// Widening cast. Narrowing casts are rejected.
    pub fn cast(&self, dtype: DType) -> Result<Self> {
        if dtype == self.dtype() {
            return Ok(self.clone());
        }
        if dtype < self.dtype() {
            return Err(DataDictError::incompatible(format!(
                "cannot cast {} values to {}",
                self.dtype(),
                dtype
            )));
        }
        Ok(match dtype {
            DType::Complex128 => Self::Complex(self.to_complex()),
            DType::Float64 => Self::Float(self.to_f64()),
            DType::Int64 => match self {
                Self::Bool(a) => Self::Int(a.mapv(i64::from)),
                _ => self.clone(),
            },
            DType::Bool => self.clone(),
        })
    }

    /// Element-wise invalid marker: NaN in float, NaN real or imaginary part in complex.
    pub fn invalid_mask(&self) -> ArrayD<bool> {
        match self {
            Self::Float(a) => a.mapv(f64::is_nan),
            Self::Complex(a) => a.mapv(|c| c.re.is_nan() || c.im.is_nan()),
            Self::Int(a) => ArrayD::from_elem(a.raw_dim(), false),
            Self::Bool(a) => ArrayD::from_elem(a.raw_dim(), false),
        }
    }

    /// Real-valued copy; complex values contribute their real part.
    pub fn to_f64(&self) -> ArrayD<f64> {
        match self {
            Self::Float(a) => a.clone(),
            Self::Complex(a) => a.mapv(|c| c.re),
            Self::Int(a) => a.mapv(|v| v as f64),
            Self::Bool(a) => a.mapv(|v| if v { 1.0 } else { 0.0 }),
        }
    }

    pub fn to_complex(&self) -> ArrayD<Complex64> {
        match self {
            Self::Complex(a) => a.clone(),
            other => other.to_f64().mapv(|v| Complex64::new(v, 0.0)),
        }
    }

    /// Repeat every element `times` times in place, on the flattened array.
    pub(crate) fn repeat_each(&self, times: usize) -> Self {
        map_values!(self, a => Array::from_iter(
            a.iter()
                .flat_map(|v| std::iter::repeat(v.clone()).take(times)),
        )
        .into_dyn())
    }

    pub fn as_float(&self) -> Option<&ArrayD<f64>> {
        match self {
            Self::Float(a) => Some(a),
            _ => None,
        }
    }
}

impl PartialEq for Values {
    fn eq(&self, other: &Self) -> bool {
        arrays_equal(self, other, DEFAULT_RTOL)
    }
}

fn reshape_array<T: Clone>(a: &ArrayD<T>, shape: &[usize]) -> Result<ArrayD<T>> {
    let data: Vec<T> = a.iter().cloned().collect();
    Ok(ArrayD::from_shape_vec(IxDyn(shape), data)?)
}

macro_rules! impl_from_values {
    ($elem:ty, $variant:ident) => {
        impl From<Vec<$elem>> for Values {
            fn from(v: Vec<$elem>) -> Self {
                Values::$variant(Array::from_vec(v).into_dyn())
            }
        }

        impl From<&[$elem]> for Values {
            fn from(v: &[$elem]) -> Self {
                Values::$variant(Array::from_vec(v.to_vec()).into_dyn())
            }
        }

        impl<D: Dimension> From<Array<$elem, D>> for Values {
            fn from(a: Array<$elem, D>) -> Self {
                Values::$variant(a.into_dyn())
            }
        }
    };
}

impl_from_values!(f64, Float);
impl_from_values!(Complex64, Complex);
impl_from_values!(i64, Int);
impl_from_values!(bool, Bool);

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_concat_promotes() {
        let a = Values::from(vec![1i64, 2]);
        let b = Values::from(vec![0.5]);
        let joined = a.concat_rows(&b).unwrap();
        assert_eq!(joined.dtype(), DType::Float64);
        assert_eq!(joined, Values::from(vec![1.0, 2.0, 0.5]));
    }

    #[test]
    fn test_concat_rejects_inner_shape_mismatch() {
        let a = Values::from(arr2(&[[1.0, 2.0]]));
        let b = Values::from(arr2(&[[1.0, 2.0, 3.0]]));
        assert!(a.concat_rows(&b).is_err());
    }

    #[test]
    fn test_transpose_and_back() {
        let a = Values::from(arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]));
        let t = a.transpose(&[1, 0]).unwrap();
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.transpose(&[1, 0]).unwrap(), a);
        assert!(a.transpose(&[0, 0]).is_err());
    }

    #[test]
    fn test_slice_rows_clamps() {
        let a = Values::from(arr1(&[1.0, 2.0, 3.0]));
        assert_eq!(a.slice_rows(1, 10), Values::from(vec![2.0, 3.0]));
        assert_eq!(a.slice_rows(5, 10).nrows(), 0);
    }

    #[test]
    fn test_narrowing_cast_rejected() {
        let a = Values::from(vec![1.5]);
        assert!(a.cast(DType::Int64).is_err());
        assert_eq!(a.cast(DType::Complex128).unwrap().dtype(), DType::Complex128);
    }

    #[test]
    fn test_empty_has_inner_shape() {
        let e = Values::empty(DType::Int64, &[4]);
        assert_eq!(e.shape(), &[0, 4]);
        assert_eq!(e.inner_shape(), &[4]);
    }
}
