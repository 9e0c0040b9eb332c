// Re-export parry for the active float size
pub use parry3d_f64 as parry3d;

/// Scalar type used for all positions and attribute values.
pub type Real = f64;

use core::str::FromStr;
use std::sync::OnceLock;

/// A small epsilon for plane classification and degenerate checks.
pub const EPSILON: Real = 1e-8;

/// Lazily-initialized tolerance used for welding and snapping.
/// Defaults to `1e-6`, but can be overridden:
///  1) **Build-time**: set env var `PROCMESH_TOLERANCE` (e.g. `PROCMESH_TOLERANCE=1e-5 cargo build`)
///  2) **Runtime**: call [`set_tolerance`] once before using the library
static TOLERANCE_CELL: OnceLock<Real> = OnceLock::new();

#[inline]
const fn default_tolerance() -> Real {
    1e-6
}

/// Returns the current tolerance.
/// If not set yet, it tries `PROCMESH_TOLERANCE` and falls back to the default.
pub fn tolerance() -> Real {
    *TOLERANCE_CELL.get_or_init(|| {
        if let Some(environment_variable) = option_env!("PROCMESH_TOLERANCE") {
            if let Ok(value) = Real::from_str(environment_variable) {
                return value.max(Real::EPSILON);
            }
        }
        default_tolerance()
    })
}

/// Set the tolerance programmatically once (subsequent calls are ignored).
pub fn set_tolerance(value: Real) {
    let _ = TOLERANCE_CELL.set(value.max(Real::EPSILON));
}

/// Archimedes' constant (π)
pub const PI: Real = core::f64::consts::PI;

/// The full circle constant (τ)
pub const TAU: Real = core::f64::consts::TAU;
