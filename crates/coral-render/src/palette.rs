//! Bounded random walk through HSV space.

use rand::Rng;

/// Hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

impl Hsv {
    #[must_use]
    pub const fn new(h: f32, s: f32, v: f32) -> Self {
        Self { h, s, v }
    }

    /// Uniform sample over the whole HSV cube.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            h: rng.random_range(0.0..360.0),
            s: rng.random::<f32>(),
            v: rng.random::<f32>(),
        }
    }

    /// Nudge every channel by up to `strength` (hue in degrees, the others in
    /// 360ths), wrapping hue and clamping the rest.
    pub fn perturb<R: Rng + ?Sized>(self, strength: f32, rng: &mut R) -> Self {
        if strength <= 0.0 {
            return self;
        }
        let mut jitter = || rng.random_range(-strength..=strength);
        Self {
            h: wrap_hue(self.h + jitter()),
            s: (self.s + jitter() / 360.0).clamp(0.0, 1.0),
            v: (self.v + jitter() / 360.0).clamp(0.0, 1.0),
        }
    }

    #[must_use]
    pub fn to_rgb(self) -> [u8; 3] {
        let h = wrap_hue(self.h) / 60.0;
        let s = self.s.clamp(0.0, 1.0);
        let v = self.v.clamp(0.0, 1.0);
        let sector = h.floor();
        let f = h - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - f * s);
        let t = v * (1.0 - (1.0 - f) * s);
        let (r, g, b) = match sector as i32 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };
        [
            (r * 255.0).round() as u8,
            (g * 255.0).round() as u8,
            (b * 255.0).round() as u8,
        ]
    }
}

fn wrap_hue(hue: f32) -> f32 {
    let wrapped = hue.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// `len` RGB colors produced by walking from a random start point.
pub fn build_palette<R: Rng + ?Sized>(len: usize, strength: f32, rng: &mut R) -> Vec<[u8; 3]> {
    let mut palette = Vec::with_capacity(len);
    let mut color = Hsv::random(rng);
    for step in 0..len {
        if step > 0 {
            color = color.perturb(strength, rng);
        }
        palette.push(color.to_rgb());
    }
    palette
}
