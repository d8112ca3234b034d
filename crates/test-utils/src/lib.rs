//! Shared test utilities for the forcing-engine workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Approximate float assertions for scalars and whole frames
//! - Synthetic forcing frame generators
//! - Temporary input directory trees
//! - Common fixtures (reference times, grids, configuration snippets)
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
//! use test_utils::{assert_approx_eq, fixtures, InputTree};
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

/// Macro for element-wise approximate equality of two arrays of equal shape.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_frame_approx_eq;
///
/// assert_frame_approx_eq!(state.final_forcings(), expected.view(), 1e-9);
/// ```
#[macro_export]
macro_rules! assert_frame_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left = &$left;
        let right = &$right;
        assert_eq!(left.shape(), right.shape(), "frame shapes differ");
        for (l, r) in left.iter().zip(right.iter()) {
            $crate::assert_approx_eq!(*l, *r, $epsilon);
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_assert_frame_approx_eq_passes() {
        let a = constant_frame([8, 2, 2], 1.0);
        let b = constant_frame([8, 2, 2], 1.0 + 1e-12);
        assert_frame_approx_eq!(a, b, 1e-9);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_frame_approx_eq_fails() {
        let a = constant_frame([8, 2, 2], 1.0);
        let b = constant_frame([8, 2, 2], 1.5);
        assert_frame_approx_eq!(a, b, 1e-9);
    }

    #[test]
    #[should_panic(expected = "frame shapes differ")]
    fn test_assert_frame_approx_eq_shape_mismatch() {
        let a = constant_frame([8, 2, 2], 1.0);
        let b = constant_frame([8, 2, 3], 1.0);
        assert_frame_approx_eq!(a, b, 1e-9);
    }
}
