//! Lane-wise float math shared by the host kernels.
//!
//! `F32x4` mirrors a 128-bit vector register; every function is pure and
//! operates on each lane independently.
use serde::{Deserialize, Serialize};

pub type F32x4 = [f32; 4];

#[inline]
fn map_lanes(a: F32x4, f: impl Fn(f32) -> f32) -> F32x4 {
    [f(a[0]), f(a[1]), f(a[2]), f(a[3])]
}

#[inline]
fn zip_lanes(a: F32x4, b: F32x4, f: impl Fn(f32, f32) -> f32) -> F32x4 {
    [f(a[0], b[0]), f(a[1], b[1]), f(a[2], b[2]), f(a[3], b[3])]
}

pub fn splat(value: f32) -> F32x4 {
    [value; 4]
}

/// Load up to four values; missing lanes are filled with `fill`.
pub fn load_partial(values: &[f32], fill: f32) -> F32x4 {
    let mut lanes = splat(fill);
    for (lane, value) in lanes.iter_mut().zip(values) {
        *lane = *value;
    }
    lanes
}

pub fn exp_ps(a: F32x4) -> F32x4 {
    map_lanes(a, f32::exp)
}

/// Natural log. Non-positive lanes yield NaN.
pub fn log_ps(a: F32x4) -> F32x4 {
    map_lanes(a, |x| if x <= 0.0 { f32::NAN } else { x.ln() })
}

pub fn sin_ps(a: F32x4) -> F32x4 {
    map_lanes(a, f32::sin)
}

pub fn cos_ps(a: F32x4) -> F32x4 {
    map_lanes(a, f32::cos)
}

pub fn sincos_ps(a: F32x4) -> (F32x4, F32x4) {
    (sin_ps(a), cos_ps(a))
}

pub fn div_ps(a: F32x4, b: F32x4) -> F32x4 {
    zip_lanes(a, b, |x, y| x / y)
}

pub fn pow_ps(a: F32x4, b: F32x4) -> F32x4 {
    zip_lanes(a, b, f32::powf)
}

pub fn min_ps(a: F32x4, b: F32x4) -> F32x4 {
    zip_lanes(a, b, f32::min)
}

pub fn max_ps(a: F32x4, b: F32x4) -> F32x4 {
    zip_lanes(a, b, f32::max)
}

/// Horizontal minimum of the four lanes.
pub fn reduce_min_ps(a: F32x4) -> f32 {
    a[0].min(a[1]).min(a[2].min(a[3]))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Relu6,
    Sigmoid,
    Tanh,
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Relu6 => x.clamp(0.0, 6.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
        }
    }

    pub fn apply_ps(self, a: F32x4) -> F32x4 {
        match self {
            Activation::Linear => a,
            Activation::Sigmoid => {
                let denom = zip_lanes(splat(1.0), exp_ps(map_lanes(a, |x| -x)), |o, e| o + e);
                div_ps(splat(1.0), denom)
            }
            other => map_lanes(a, |x| other.apply(x)),
        }
    }

    /// Apply in place, four lanes at a time.
    pub fn apply_slice(self, values: &mut [f32]) {
        if self == Activation::Linear {
            return;
        }
        let mut chunks = values.chunks_exact_mut(4);
        for chunk in &mut chunks {
            let out = self.apply_ps([chunk[0], chunk[1], chunk[2], chunk[3]]);
            chunk.copy_from_slice(&out);
        }
        for value in chunks.into_remainder() {
            *value = self.apply(*value);
        }
    }
}

/// Dot product accumulated in four lanes.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    let mut acc = splat(0.0);
    let mut lhs = a.chunks_exact(4);
    let mut rhs = b.chunks_exact(4);
    for (x, y) in (&mut lhs).zip(&mut rhs) {
        for lane in 0..4 {
            acc[lane] += x[lane] * y[lane];
        }
    }
    let tail = lhs
        .remainder()
        .iter()
        .zip(rhs.remainder())
        .map(|(x, y)| x * y)
        .sum::<f32>();
    acc[0] + acc[1] + acc[2] + acc[3] + tail
}
