//! Shared test utilities for the datadict workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Sweep data generators
//! - Scratch directories for log files
//! - Approximate equality assertions that treat NaN as equal to NaN
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, sweep_coordinates, TempLogDir};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for element-wise approximate equality of two float sequences.
///
/// NaN entries must line up: NaN compares equal to NaN and to nothing else.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_values_approx_eq;
///
/// assert_values_approx_eq!(&[1.0, f64::NAN], &[1.0001, f64::NAN], 0.001);
/// ```
#[macro_export]
macro_rules! assert_values_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: Vec<f64> = $left.iter().map(|v| *v as f64).collect();
        let right: Vec<f64> = $right.iter().map(|v| *v as f64).collect();
        assert_eq!(left.len(), right.len(), "length mismatch");
        for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
            if l.is_nan() || r.is_nan() {
                assert!(
                    l.is_nan() && r.is_nan(),
                    "assertion failed: NaN mismatch at index {}: `{:?}` vs `{:?}`",
                    i,
                    l,
                    r
                );
            } else {
                $crate::assert_approx_eq!(*l, *r, $epsilon);
            }
        }
    }};
}
