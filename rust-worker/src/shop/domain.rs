//! Shop domain parsing.

use std::fmt;

use thiserror::Error;

/// Maximum length of a DNS hostname.
const MAX_DOMAIN_LENGTH: usize = 253;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid shop domain: {0:?}")]
pub struct InvalidShopDomain(pub String);

/// Validated, lowercased shop hostname such as `snowdevil.myshopify.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Parse a shop domain from a header value.
    ///
    /// Accepts ASCII letters, digits, `-` and `.`, requires at least one dot,
    /// and rejects empty labels or labels starting or ending with `-`.
    pub fn parse(raw: &str) -> Result<Self, InvalidShopDomain> {
        let domain = raw.trim().to_ascii_lowercase();
        let invalid = || InvalidShopDomain(raw.to_string());

        if domain.is_empty() || domain.len() > MAX_DOMAIN_LENGTH || !domain.contains('.') {
            return Err(invalid());
        }

        for label in domain.split('.') {
            let valid = !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
            if !valid {
                return Err(invalid());
            }
        }

        Ok(Self(domain))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let domain = ShopDomain::parse("  SnowDevil.MyShopify.com ").unwrap();
        assert_eq!(domain.as_str(), "snowdevil.myshopify.com");
    }

    #[test]
    fn test_parse_rejects_bad_domains() {
        for raw in [
            "",
            "localhost",
            "snowdevil..myshopify.com",
            ".myshopify.com",
            "-snow.myshopify.com",
            "snow-.myshopify.com",
            "snow devil.myshopify.com",
            "snowdevil.myshopify.com/admin",
            "https://snowdevil.myshopify.com",
        ] {
            assert!(ShopDomain::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_parse_accepts_hyphenated_shops() {
        assert!(ShopDomain::parse("snow-devil-2.myshopify.com").is_ok());
    }
}
