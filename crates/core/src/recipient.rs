//! Recipients as supplied by the upload step or the send request.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Basic `local@domain.tld` shape check. No DNS, no RFC 5322 parsing.
static EMAIL_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex compiles"));

/// One addressee of a bulk job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Returns true if `email` looks like `local@domain.tld`.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_SHAPE.is_match(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "a", "a@x", "@x.com", "a@.com ", "a b@x.com", "a@@x.com", "a@x."] {
            assert!(!is_valid_email(bad), "{bad:?} should be rejected");
        }
    }
}
