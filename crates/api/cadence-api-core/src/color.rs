//! sRGB colors and the Oklab conversions used for perceptual blending.
//!
//! Components are stored as non-linear sRGB in `[0, 1]` with straight alpha.
//! `to_oklab` / `from_oklab` follow Björn Ottosson's reference matrices.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "opaque")]
    pub a: f32,
}

fn opaque() -> f32 {
    1.0
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ColorParseError {
    #[error("expected 6 or 8 hex digits, got {len} in {input:?}")]
    Length { input: String, len: usize },
    #[error("invalid hex digit in {input:?}")]
    Digit { input: String },
}

#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(input: &str) -> Result<Self, ColorParseError> {
        let digits = input.trim().trim_start_matches('#');
        if digits.len() != 6 && digits.len() != 8 {
            return Err(ColorParseError::Length {
                input: input.to_string(),
                len: digits.len(),
            });
        }
        let channel = |i: usize| -> Result<f32, ColorParseError> {
            let byte = digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| ColorParseError::Digit {
                    input: input.to_string(),
                })?;
            Ok(byte as f32 / 255.0)
        };
        let a = if digits.len() == 8 { channel(6)? } else { 1.0 };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?, a))
    }

    pub fn to_hex(&self) -> String {
        let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        if self.a >= 1.0 {
            format!("#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
        } else {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                byte(self.r),
                byte(self.g),
                byte(self.b),
                byte(self.a)
            )
        }
    }

    /// Convert to Oklab `[L, a, b]`.
    pub fn to_oklab(&self) -> [f32; 3] {
        let r = srgb_to_linear(self.r);
        let g = srgb_to_linear(self.g);
        let b = srgb_to_linear(self.b);

        let l = 0.412_221_47 * r + 0.536_332_55 * g + 0.051_445_995 * b;
        let m = 0.211_903_5 * r + 0.680_699_5 * g + 0.107_396_96 * b;
        let s = 0.088_302_46 * r + 0.281_718_85 * g + 0.629_978_7 * b;

        let l_ = l.cbrt();
        let m_ = m.cbrt();
        let s_ = s.cbrt();

        [
            0.210_454_26 * l_ + 0.793_617_8 * m_ - 0.004_072_047 * s_,
            1.977_998_5 * l_ - 2.428_592_2 * m_ + 0.450_593_7 * s_,
            0.025_904_037 * l_ + 0.782_771_77 * m_ - 0.808_675_77 * s_,
        ]
    }

    /// Build a color from Oklab `[L, a, b]` and an alpha. Out-of-gamut results
    /// are clamped to `[0, 1]` per channel.
    pub fn from_oklab(lab: [f32; 3], alpha: f32) -> Self {
        let [l, a, b] = lab;
        let l_ = l + 0.396_337_78 * a + 0.215_803_76 * b;
        let m_ = l - 0.105_561_35 * a - 0.063_854_17 * b;
        let s_ = l - 0.089_484_18 * a - 1.291_485_5 * b;

        let l3 = l_ * l_ * l_;
        let m3 = m_ * m_ * m_;
        let s3 = s_ * s_ * s_;

        let r = 4.076_741_7 * l3 - 3.307_711_6 * m3 + 0.230_969_94 * s3;
        let g = -1.268_438 * l3 + 2.609_757_4 * m3 - 0.341_319_38 * s3;
        let bl = -0.004_196_086_3 * l3 - 0.703_418_6 * m3 + 1.707_614_7 * s3;

        Self::new(
            linear_to_srgb(r).clamp(0.0, 1.0),
            linear_to_srgb(g).clamp(0.0, 1.0),
            linear_to_srgb(bl).clamp(0.0, 1.0),
            alpha,
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}
