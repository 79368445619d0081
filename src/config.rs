/// Input-artifact parsing.
///
/// The configuration artifact is plain text with whitespace-separated decimal
/// tokens in fixed order: modulus component `p`, modulus component `q`, the
/// public exponent `e`, and the message `M`. A fifth token, when present, is
/// an out-of-band private exponent `d`; without it the private exponent is
/// derived from `p`, `q` and `e` on the host (see [`crate::keys`]).

use std::fs;
use std::path::Path;

use crate::bignum::BigNumber;
use crate::error::{Result, RsaClError};

/// Parsed key and message material, still in decimal-text form for the
/// big-number fields.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub p: String,
    pub q: String,
    pub public_exponent: u32,
    pub message: String,
    /// Out-of-band private exponent, if the artifact supplies one.
    pub private_exponent: Option<u32>,
}

impl RunConfig {
    /// Reads and parses a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parses configuration text: `p q e message [d]`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokens = text.split_whitespace();
        let mut next = |name: &str| {
            tokens
                .next()
                .ok_or_else(|| RsaClError::InputMalformed(format!("missing {name} token")))
        };

        let p = next("p")?.to_string();
        let q = next("q")?.to_string();
        let e_token = next("public exponent")?;
        let public_exponent = parse_exponent(e_token, "public exponent")?;
        let message = next("message")?.to_string();
        let private_exponent = match tokens.next() {
            Some(token) => Some(parse_exponent(token, "private exponent")?),
            None => None,
        };

        if let Some(extra) = tokens.next() {
            return Err(RsaClError::InputMalformed(format!(
                "unexpected trailing token {extra:?}"
            )));
        }

        Ok(Self {
            p,
            q,
            public_exponent,
            message,
            private_exponent,
        })
    }

    /// Big-number view of the modulus components and message. Capacity
    /// violations surface here, before any device work begins.
    pub fn operands(&self) -> Result<(BigNumber, BigNumber, BigNumber)> {
        let p = BigNumber::from_decimal_str(&self.p)?;
        let q = BigNumber::from_decimal_str(&self.q)?;
        let message = BigNumber::from_decimal_str(&self.message)?;
        Ok((p, q, message))
    }
}

fn parse_exponent(token: &str, name: &str) -> Result<u32> {
    token.parse::<u32>().map_err(|e| {
        RsaClError::InputMalformed(format!("{name} token {token:?} is not a valid integer: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_four_tokens() {
        let config = RunConfig::parse("61 53 17 65").unwrap();
        assert_eq!(config.p, "61");
        assert_eq!(config.q, "53");
        assert_eq!(config.public_exponent, 17);
        assert_eq!(config.message, "65");
        assert_eq!(config.private_exponent, None);
    }

    #[test]
    fn test_parse_with_private_exponent() {
        let config = RunConfig::parse("61 53 17 65 2753\n").unwrap();
        assert_eq!(config.private_exponent, Some(2753));
    }

    #[test]
    fn test_missing_message_token() {
        match RunConfig::parse("61 53 17") {
            Err(RsaClError::InputMalformed(msg)) => assert!(msg.contains("message")),
            other => panic!("expected InputMalformed, got {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_exponent() {
        assert!(matches!(
            RunConfig::parse("61 53 seventeen 65"),
            Err(RsaClError::InputMalformed(_))
        ));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(matches!(
            RunConfig::parse("61 53 17 65 2753 junk"),
            Err(RsaClError::InputMalformed(_))
        ));
    }

    #[test]
    fn test_operands_surface_capacity_violation() {
        let huge = "9".repeat(501);
        let config = RunConfig::parse(&format!("{huge} 53 17 65")).unwrap();
        assert!(matches!(
            config.operands(),
            Err(RsaClError::CapacityExceeded { .. })
        ));
    }
}
