//! Interpolation helpers:
//! - scalar / fixed-size array lerp
//! - variable-length vector lerp (missing elements treated as 0.0)
//! - Oklab color blend
//! - step selection for discrete kinds

use cadence_api_core::Color;

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_f64(a: f64, b: f64, t: f32) -> f64 {
    a + (b - a) * t as f64
}

#[inline]
pub fn lerp_vec2(a: [f32; 2], b: [f32; 2], t: f32) -> [f32; 2] {
    [lerp_f32(a[0], b[0], t), lerp_f32(a[1], b[1], t)]
}

#[inline]
pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

#[inline]
pub fn lerp_vec4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ]
}

/// Blend two generic vectors elementwise. If lengths differ, treat missing
/// elements as 0.0; the result has the longer length.
pub fn lerp_slice(a: &[f32], b: &[f32], t: f32) -> Vec<f32> {
    let n = a.len().max(b.len());
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let ai = *a.get(i).unwrap_or(&0.0);
        let bi = *b.get(i).unwrap_or(&0.0);
        out.push(lerp_f32(ai, bi, t));
    }
    out
}

/// Blend in Oklab; alpha is blended linearly. Endpoints are returned as-is so
/// the color space round trip never perturbs the exact start or end value.
pub fn lerp_color(a: &Color, b: &Color, t: f32) -> Color {
    if t <= 0.0 {
        return *a;
    }
    if t >= 1.0 {
        return *b;
    }
    let la = a.to_oklab();
    let lb = b.to_oklab();
    Color::from_oklab(lerp_vec3(la, lb, t), lerp_f32(a.a, b.a, t))
}

/// Step interpolation: left value before the midpoint, right value from it on.
#[inline]
pub fn step<T: Clone>(a: &T, b: &T, t: f32) -> T {
    if t < 0.5 {
        a.clone()
    } else {
        b.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_lerp_pads_shorter_side() {
        assert_eq!(lerp_slice(&[1.0], &[3.0, 4.0], 0.5), vec![2.0, 2.0]);
    }

    #[test]
    fn color_midpoint_differs_from_rgb_average() {
        let red = Color::rgb(1.0, 0.0, 0.0);
        let blue = Color::rgb(0.0, 0.0, 1.0);
        let mid = lerp_color(&red, &blue, 0.5);
        // Component-wise sRGB would give (0.5, 0, 0.5); Oklab keeps it brighter.
        assert!(mid.r > 0.5 || mid.b > 0.5);
        assert_eq!(lerp_color(&red, &blue, 1.0), blue);
    }

    #[test]
    fn step_switches_at_midpoint() {
        assert!(!step(&false, &true, 0.49));
        assert!(step(&false, &true, 0.5));
    }
}
