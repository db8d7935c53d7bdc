//! Triangular membership functions.

use serde::{Deserialize, Serialize};

/// Triangle `(a, b, c)` with `a <= b <= c`. Degree is 0 outside `[a, c]`, 1 at `b`.
///
/// Shoulders are allowed: `[0, 0, 0.5]` is 1 at 0 and falls to 0 at 0.5.
/// Written in config as a three-element array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Triangle {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Triangle {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Membership degree of `x`, in `[0, 1]`.
    pub fn degree(&self, x: f64) -> f64 {
        let Triangle { a, b, c } = *self;
        if x.is_nan() || x < a || x > c {
            0.0
        } else if x == b {
            1.0
        } else if x < b {
            (x - a) / (b - a)
        } else {
            (c - x) / (c - b)
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let Triangle { a, b, c } = *self;
        if !(a.is_finite() && b.is_finite() && c.is_finite()) {
            anyhow::bail!("non-finite breakpoints [{a}, {b}, {c}]");
        }
        if !(a <= b && b <= c) {
            anyhow::bail!("breakpoints must satisfy a <= b <= c, got [{a}, {b}, {c}]");
        }
        Ok(())
    }
}

impl From<[f64; 3]> for Triangle {
    fn from([a, b, c]: [f64; 3]) -> Self {
        Self { a, b, c }
    }
}

impl From<Triangle> for [f64; 3] {
    fn from(t: Triangle) -> Self {
        [t.a, t.b, t.c]
    }
}
