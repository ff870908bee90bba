/// Zero-suppression mode from the %FS command.
///
/// Leading suppression (the standard) right-aligns digits against the decimal
/// point; trailing suppression left-aligns them and is deprecated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ZeroSuppression {
    #[default]
    Leading,
    Trailing,
}

/// Coordinate format from the %FS (format specification) command.
///
/// `%FSLAX24Y24*%` means leading-zero suppression, absolute notation, and
/// 2 integer + 4 decimal digits on both axes.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateFormat {
    pub x_integer: u8,
    pub x_decimal: u8,
    pub y_integer: u8,
    pub y_decimal: u8,
    pub suppression: ZeroSuppression,
}

impl Default for CoordinateFormat {
    fn default() -> Self {
        // Common default: 2.4 format.
        Self {
            x_integer: 2,
            x_decimal: 4,
            y_integer: 2,
            y_decimal: 4,
            suppression: ZeroSuppression::Leading,
        }
    }
}

/// Unit system from the %MO command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Millimeters,
    Inches,
}

/// A coordinate field as it appeared in the file: the parsed integer plus how
/// many digits it was written with. The digit count is what makes
/// trailing-zero-suppressed values decodable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCoord {
    pub value: i64,
    pub digits: u8,
}

/// Converts raw Gerber coordinate fields to millimetres.
#[derive(Debug, Clone, Default)]
pub struct CoordinateConverter {
    pub format: CoordinateFormat,
    pub units: Option<Units>,
}

impl CoordinateConverter {
    pub fn x_to_mm(&self, raw: RawCoord) -> f64 {
        self.convert(raw, self.format.x_integer, self.format.x_decimal)
    }

    pub fn y_to_mm(&self, raw: RawCoord) -> f64 {
        self.convert(raw, self.format.y_integer, self.format.y_decimal)
    }

    fn convert(&self, raw: RawCoord, integer_digits: u8, decimal_digits: u8) -> f64 {
        let mut value = raw.value as f64;
        if self.suppression() == ZeroSuppression::Trailing {
            let total = integer_digits + decimal_digits;
            if raw.digits < total {
                value *= 10f64.powi(i32::from(total - raw.digits));
            }
        }
        let scaled = value / 10f64.powi(i32::from(decimal_digits));
        match self.units.unwrap_or(Units::Millimeters) {
            Units::Millimeters => scaled,
            Units::Inches => scaled * 25.4,
        }
    }

    fn suppression(&self) -> ZeroSuppression {
        self.format.suppression
    }
}
