/// Fixed-capacity decimal big-number representation.
///
/// A `BigNumber` stores up to [`MAXDIGITS`] decimal digits, least significant
/// first, together with a sign. The layout is `#[repr(C)]` because the whole
/// struct is the wire format shared with the device kernels: the host copies
/// the full memory image into a device buffer and reads the result buffer
/// back over the same layout. No host-side arithmetic is provided; values are
/// constructed once and only ever overwritten as a readback target.

use std::fmt;

use crate::error::{Result, RsaClError};

/// Maximum number of decimal digits a [`BigNumber`] can hold.
///
/// The device kernels are compiled with the same constant, so the two sides
/// always agree on the buffer layout.
pub const MAXDIGITS: usize = 500;

const PLUS: i32 = 1;
const MINUS: i32 = -1;

/// Sign of a [`BigNumber`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
}

/// A signed decimal integer of at most [`MAXDIGITS`] digits.
///
/// `digits[0]` is the units digit; `last_digit` is the index of the highest
/// populated digit. Zero is `last_digit == 0` with `digits[0] == 0`. Digits
/// above `last_digit` are kept zero-filled but carry no value.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct BigNumber {
    digits: [u8; MAXDIGITS],
    sign: i32,
    last_digit: i32,
}

impl BigNumber {
    /// Builds a value from a signed native integer.
    pub fn from_int(value: i64) -> Self {
        let mut num = Self::unset();
        num.sign = if value >= 0 { PLUS } else { MINUS };

        let mut t = value.unsigned_abs();
        while t > 0 {
            num.last_digit += 1;
            num.digits[num.last_digit as usize] = (t % 10) as u8;
            t /= 10;
        }
        if value == 0 {
            num.last_digit = 0;
        }
        num
    }

    /// Builds a value from a run of ASCII decimal digits, most significant
    /// first. No sign character or separators are accepted.
    ///
    /// Fails with [`RsaClError::CapacityExceeded`] when the token is longer
    /// than [`MAXDIGITS`] and [`RsaClError::InputMalformed`] on any
    /// non-digit byte or an empty token.
    pub fn from_decimal_str(token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(RsaClError::InputMalformed(
                "empty decimal token".to_string(),
            ));
        }
        if token.len() > MAXDIGITS {
            return Err(RsaClError::CapacityExceeded {
                len: token.len(),
                max: MAXDIGITS,
            });
        }

        let mut num = Self::from_int(0);
        let bytes = token.as_bytes();
        for (i, &b) in bytes.iter().enumerate() {
            if !b.is_ascii_digit() {
                return Err(RsaClError::InputMalformed(format!(
                    "non-decimal character {:?} in token {:?}",
                    b as char, token
                )));
            }
            num.digits[bytes.len() - 1 - i] = b - b'0';
        }
        num.last_digit = (bytes.len() - 1) as i32;
        Ok(num)
    }

    /// An unwritten readback target. Only valid as the destination of a
    /// device readback, which overwrites every field.
    pub(crate) fn unset() -> Self {
        Self {
            digits: [0u8; MAXDIGITS],
            sign: PLUS,
            last_digit: -1,
        }
    }

    pub fn sign(&self) -> Sign {
        if self.sign == MINUS {
            Sign::Negative
        } else {
            Sign::Positive
        }
    }

    /// Index of the highest populated digit.
    pub fn last_digit(&self) -> usize {
        self.last_digit.max(0) as usize
    }

    /// Native-width view of the magnitude, when it fits in a `u64`.
    ///
    /// Used to bring small moduli into host range for private-exponent
    /// derivation; this is not general host arithmetic.
    pub fn to_u64(&self) -> Option<u64> {
        if self.last_digit < 0 {
            return None;
        }
        let mut value: u64 = 0;
        for i in (0..=self.last_digit as usize).rev() {
            value = value.checked_mul(10)?.checked_add(u64::from(self.digits[i]))?;
        }
        Some(value)
    }
}

impl fmt::Display for BigNumber {
    /// Canonical decimal rendering: optional leading `-`, then the digits
    /// from most to least significant.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sign == MINUS {
            write!(f, "-")?;
        }
        for i in (0..=self.last_digit()).rev() {
            write!(f, "{}", self.digits[i])?;
        }
        Ok(())
    }
}

impl fmt::Debug for BigNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BigNumber({self})")
    }
}

impl PartialEq for BigNumber {
    fn eq(&self, other: &Self) -> bool {
        self.sign == other.sign
            && self.last_digit == other.last_digit
            && self.digits[..=self.last_digit()] == other.digits[..=other.last_digit()]
    }
}

impl Eq for BigNumber {}
