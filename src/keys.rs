/// Private-exponent derivation and validation.
///
/// The device kernels take the exponents as native scalars, so the host only
/// ever needs exponent arithmetic in native width. When the modulus
/// components fit in a `u64` the private exponent is derived as the modular
/// inverse of `e` modulo `phi = (p - 1) * (q - 1)` and validated against
/// `e * d ≡ 1 (mod lcm(p - 1, q - 1))`. Moduli beyond native width cannot be
/// checked on the host; an explicitly supplied exponent is then accepted
/// as-is with a logged warning.

use log::warn;

use crate::bignum::BigNumber;
use crate::error::{Result, RsaClError};

/// Key material for one run: modulus components as big numbers, exponents as
/// device-scalar integers.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub p: BigNumber,
    pub q: BigNumber,
    pub public_exponent: u32,
    pub private_exponent: u32,
}

impl KeyMaterial {
    /// Assembles key material, deriving the private exponent when none is
    /// supplied and validating it whenever the moduli fit native width.
    pub fn assemble(
        p: BigNumber,
        q: BigNumber,
        public_exponent: u32,
        private_exponent: Option<u32>,
    ) -> Result<Self> {
        let native = match (p.to_u64(), q.to_u64()) {
            (Some(pv), Some(qv)) => Some((pv, qv)),
            _ => None,
        };

        let private_exponent = match (private_exponent, native) {
            (Some(d), Some((pv, qv))) => {
                validate_exponent_pair(public_exponent, d, pv, qv)?;
                d
            }
            (Some(d), None) => {
                warn!(
                    "modulus components exceed native width; \
                     accepting private exponent {d} unvalidated"
                );
                d
            }
            (None, Some((pv, qv))) => derive_private_exponent(pv, qv, public_exponent)?,
            (None, None) => {
                return Err(RsaClError::InputMalformed(
                    "modulus components exceed native width and no private \
                     exponent was supplied; derivation is not possible on the host"
                        .to_string(),
                ));
            }
        };

        Ok(Self {
            p,
            q,
            public_exponent,
            private_exponent,
        })
    }
}

/// Derives the private exponent as the inverse of `e` modulo
/// `phi = (p - 1) * (q - 1)`.
pub fn derive_private_exponent(p: u64, q: u64, e: u32) -> Result<u32> {
    if p < 2 || q < 2 {
        return Err(RsaClError::InputMalformed(format!(
            "modulus components must be at least 2, got p={p} q={q}"
        )));
    }
    let phi = u128::from(p - 1) * u128::from(q - 1);
    let d = mod_inverse(u128::from(e), phi).ok_or_else(|| {
        RsaClError::InputMalformed(format!(
            "public exponent {e} is not invertible modulo phi(n) = {phi}"
        ))
    })?;
    u32::try_from(d).map_err(|_| {
        RsaClError::InputMalformed(format!(
            "derived private exponent {d} does not fit the kernel's scalar width"
        ))
    })
}

/// Checks `e * d ≡ 1 (mod lcm(p - 1, q - 1))`.
pub fn validate_exponent_pair(e: u32, d: u32, p: u64, q: u64) -> Result<()> {
    if p < 2 || q < 2 {
        return Err(RsaClError::InputMalformed(format!(
            "modulus components must be at least 2, got p={p} q={q}"
        )));
    }
    let carmichael = lcm(u128::from(p - 1), u128::from(q - 1));
    if carmichael == 0 || u128::from(e) * u128::from(d) % carmichael != 1 {
        return Err(RsaClError::InputMalformed(format!(
            "private exponent {d} is not the inverse of {e} modulo lcm(p-1, q-1) = {carmichael}"
        )));
    }
    Ok(())
}

/// Iterative extended Euclid; returns `a^-1 mod m` when `gcd(a, m) == 1`.
fn mod_inverse(a: u128, m: u128) -> Option<u128> {
    if m <= 1 {
        return None;
    }
    let (mut old_r, mut r) = (i128::try_from(a % m).ok()?, i128::try_from(m).ok()?);
    let (mut old_s, mut s) = (1i128, 0i128);
    while r != 0 {
        let quotient = old_r / r;
        (old_r, r) = (r, old_r - quotient * r);
        (old_s, s) = (s, old_s - quotient * s);
    }
    if old_r != 1 {
        return None;
    }
    let m = i128::try_from(m).ok()?;
    Some(old_s.rem_euclid(m) as u128)
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: u128, b: u128) -> u128 {
    if a == 0 || b == 0 {
        return 0;
    }
    a / gcd(a, b) * b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_textbook_pair() {
        // p=61 q=53 e=17: phi = 3120, 17 * 2753 = 46801 = 15 * 3120 + 1.
        assert_eq!(derive_private_exponent(61, 53, 17).unwrap(), 2753);
    }

    #[test]
    fn test_derive_rejects_non_coprime_exponent() {
        // phi(7 * 11) = 60, gcd(6, 60) != 1.
        assert!(matches!(
            derive_private_exponent(7, 11, 6),
            Err(RsaClError::InputMalformed(_))
        ));
    }

    #[test]
    fn test_validate_accepts_phi_and_carmichael_inverses() {
        // lcm(60, 52) = 780; both 2753 (mod-phi inverse) and 413
        // (mod-lcm inverse) satisfy 17 * d = 1 mod 780.
        validate_exponent_pair(17, 2753, 61, 53).unwrap();
        validate_exponent_pair(17, 413, 61, 53).unwrap();
    }

    #[test]
    fn test_validate_rejects_wrong_exponent() {
        assert!(matches!(
            validate_exponent_pair(17, 503, 61, 53),
            Err(RsaClError::InputMalformed(_))
        ));
    }

    #[test]
    fn test_assemble_derives_when_unsupplied() {
        let key = KeyMaterial::assemble(
            BigNumber::from_int(61),
            BigNumber::from_int(53),
            17,
            None,
        )
        .unwrap();
        assert_eq!(key.private_exponent, 2753);
    }

    #[test]
    fn test_assemble_validates_supplied_exponent() {
        assert!(KeyMaterial::assemble(
            BigNumber::from_int(61),
            BigNumber::from_int(53),
            17,
            Some(2753),
        )
        .is_ok());

        assert!(matches!(
            KeyMaterial::assemble(
                BigNumber::from_int(61),
                BigNumber::from_int(53),
                17,
                Some(503),
            ),
            Err(RsaClError::InputMalformed(_))
        ));
    }

    #[test]
    fn test_assemble_oversized_moduli_need_explicit_exponent() {
        let huge = BigNumber::from_decimal_str(&"9".repeat(40)).unwrap();
        assert!(matches!(
            KeyMaterial::assemble(huge, huge, 17, None),
            Err(RsaClError::InputMalformed(_))
        ));
        let key = KeyMaterial::assemble(huge, huge, 17, Some(2753)).unwrap();
        assert_eq!(key.private_exponent, 2753);
    }
}
