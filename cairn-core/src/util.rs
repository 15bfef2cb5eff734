//! Utility types, used throughout the crate.

/// A float which is never NaN or infinite, and thus can be `Eq`, `Ord` and `Hash`.
#[derive(Copy, Clone, PartialEq, PartialOrd, Debug)]
#[repr(transparent)]
pub struct FiniteF64(f64);
impl FiniteF64 {
    pub const ZERO: Self = Self(0.0);
    pub const ONE: Self = Self(1.0);
    pub fn new(val: f64) -> Result<Self, FiniteF64Error> {
        if val.is_finite() {
            // Fold -0.0 into 0.0, so that equal values hash equally.
            Ok(Self(if val == 0.0 { 0.0 } else { val }))
        } else {
            Err(FiniteF64Error::NotFinite)
        }
    }
    #[must_use]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for FiniteF64 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<f64> for FiniteF64 {
    type Error = FiniteF64Error;
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
impl From<FiniteF64> for f64 {
    fn from(value: FiniteF64) -> Self {
        value.get()
    }
}
impl std::fmt::Display for FiniteF64 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Always show a decimal point, so the text reads back as a float and not an integer.
        let text = self.0.to_string();
        if text.contains(|c| c == '.' || c == 'e') {
            f.write_str(&text)
        } else {
            write!(f, "{text}.0")
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FiniteF64Error {
    #[error("not finite")]
    NotFinite,
}

// No component is ever NaN, so PartialEq acts like Eq.
impl Eq for FiniteF64 {}
#[allow(clippy::derive_ord_xor_partial_ord)]
impl Ord for FiniteF64 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}
impl std::hash::Hash for FiniteF64 {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Sound since x == y implies identical bits here (no NaN, no negative zero).
        state.write_u64(self.0.to_bits());
    }
}

#[cfg(test)]
mod test {
    use super::{FiniteF64, FiniteF64Error};
    #[test]
    fn rejects_non_finite() {
        assert_eq!(FiniteF64::new(f64::NAN), Err(FiniteF64Error::NotFinite));
        assert_eq!(FiniteF64::new(f64::INFINITY), Err(FiniteF64Error::NotFinite));
        assert_eq!(FiniteF64::new(1.5).map(FiniteF64::get), Ok(1.5));
    }
    #[test]
    fn negative_zero_is_zero() {
        let neg = FiniteF64::new(-0.0).unwrap();
        assert_eq!(neg, FiniteF64::ZERO);
        assert_eq!(neg.get().to_bits(), 0.0f64.to_bits());
    }
    #[test]
    fn display_keeps_decimal() {
        assert_eq!(FiniteF64::new(2.0).unwrap().to_string(), "2.0");
        assert_eq!(FiniteF64::new(0.25).unwrap().to_string(), "0.25");
    }
}
