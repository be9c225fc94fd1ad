use fixed::types::I32F32;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn from_inches(value: f32) -> Pt {
        Pt::from_f32(value * 72.0)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        Pt::from_milli_i128(milli as i128)
    }

    fn from_milli_i128(milli: i128) -> Pt {
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Pt(I32F32::from_bits(bits))
    }

    // Milli-point integer math; half rounds away from zero on both signs.
    pub fn to_px_i64(self, dpi: u32) -> i64 {
        let num = (self.to_milli_i64() as i128) * (dpi as i128);
        let den = 72_000i128;
        let adj = if num >= 0 { den / 2 } else { -(den / 2) };
        ((num + adj) / den).clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn to_px_u32(self, dpi: u32) -> u32 {
        self.to_px_i64(dpi).clamp(0, u32::MAX as i64) as u32
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::from_milli_i128(self.to_milli_i64() as i128 + rhs.to_milli_i64() as i128)
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::from_milli_i128(self.to_milli_i64() as i128 - rhs.to_milli_i64() as i128)
    }
}

impl std::ops::Mul<f32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: f32) -> Pt {
        if !rhs.is_finite() {
            return Pt::ZERO;
        }
        Pt::from_f32(self.to_f32() * rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn from_inches(width_in: f32, height_in: f32) -> Self {
        Self {
            width: Pt::from_inches(width_in),
            height: Pt::from_inches(height_in),
        }
    }

    pub fn from_mm(width_mm: f32, height_mm: f32) -> Self {
        Self {
            width: Pt::from_f32(width_mm * 72.0 / 25.4),
            height: Pt::from_f32(height_mm * 72.0 / 25.4),
        }
    }

    pub fn card_portrait() -> Self {
        // 2.5in x 4in at 72pt/in.
        Self::from_inches(2.5, 4.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PxRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PxRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milli_round_trips_through_fixed_bits() {
        for milli in [-123_456i64, -1, 0, 1, 999, 72_000, 288_000] {
            assert_eq!(Pt::from_milli_i64(milli).to_milli_i64(), milli);
        }
    }

    #[test]
    fn px_conversion_rounds_half_away_from_zero() {
        // 0.12 pt at 300 dpi is exactly 0.5 px.
        assert_eq!(Pt::from_milli_i64(120).to_px_i64(300), 1);
        assert_eq!(Pt::from_milli_i64(-120).to_px_i64(300), -1);
        assert_eq!(Pt::from_milli_i64(119).to_px_i64(300), 0);
    }

    #[test]
    fn card_portrait_is_exact_at_300_dpi() {
        let size = Size::card_portrait();
        assert_eq!(size.width.to_milli_i64(), 180_000);
        assert_eq!(size.height.to_milli_i64(), 288_000);
        assert_eq!(size.width.to_px_u32(300), 750);
        assert_eq!(size.height.to_px_u32(300), 1200);
    }

    #[test]
    fn inches_and_millimetres_agree() {
        let inches = Size::from_inches(1.0, 2.0);
        let mm = Size::from_mm(25.4, 50.8);
        assert_eq!(inches.width.to_milli_i64(), mm.width.to_milli_i64());
        assert_eq!(inches.height.to_milli_i64(), mm.height.to_milli_i64());
    }
}
