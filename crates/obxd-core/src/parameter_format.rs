//! Parameter value formatting and parsing.
//!
//! The control protocol is string based: every value crossing it is rendered
//! by a [`Formatter`] and read back through [`Formatter::parse`].
//!
//! # Example
//!
//! ```ignore
//! use obxd_core::parameter_format::Formatter;
//!
//! let float = Formatter::Float { precision: 3 };
//! assert_eq!(float.text(0.7), "0.700");
//!
//! assert_eq!(Formatter::Integer.text(1.0), "1");
//! assert_eq!(Formatter::Integer.text(0.75), "0");
//! ```

/// Parameter value formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    /// Fixed-precision decimal (e.g. "0.700").
    Float {
        /// Number of decimal places.
        precision: usize,
    },

    /// Integer part only, truncated toward zero (e.g. "1").
    Integer,
}

impl Formatter {
    /// Format a value for display.
    pub fn text(&self, value: f32) -> String {
        match self {
            Self::Float { precision } => format!("{value:.precision$}"),
            Self::Integer => format!("{}", value.trunc() as i32),
        }
    }

    /// Parse user or host input.
    ///
    /// Both variants accept any decimal number, so `"0.8"` is a valid write
    /// to an integer parameter and is clamped by the caller. Non-finite
    /// values are rejected.
    pub fn parse(&self, s: &str) -> Option<f32> {
        s.trim().parse::<f32>().ok().filter(|v| v.is_finite())
    }
}
