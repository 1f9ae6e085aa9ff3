//! Opaque cursor tokens for keyset pagination.
//!
//! A token is the lowercase hex encoding of a small JSON object holding the
//! last-seen order value and record id. Callers must treat it as opaque.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::DomainError;

/// Decoded cursor: the order value and id of the last record of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorToken {
    /// Order-field value of the last record, as text.
    pub after: String,
    /// Id of the last record.
    pub tiebreaker_id: String,
}

impl CursorToken {
    /// Creates a token.
    #[must_use]
    pub fn new(after: impl Into<String>, tiebreaker_id: impl Into<String>) -> Self {
        Self {
            after: after.into(),
            tiebreaker_id: tiebreaker_id.into(),
        }
    }

    /// Encodes the token into its opaque string form.
    #[must_use]
    pub fn encode(&self) -> String {
        let json = json!({ "after": self.after, "tiebreakerId": self.tiebreaker_id });
        hex::encode(json.to_string())
    }

    /// Decodes an opaque token.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidArgument` if the token is malformed.
    pub fn decode(token: &str) -> Result<Self, DomainError> {
        let malformed = || DomainError::invalid("malformed cursor token");
        let bytes = hex::decode(token.trim()).map_err(|_| malformed())?;
        serde_json::from_slice(&bytes).map_err(|_| malformed())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_token_decodes_what_it_encodes() {
        let token = CursorToken::new("2026-01-15T10:00:00Z", "3f1c0a9e-0000-4000-8000-000000000001");

        let encoded = token.encode();

        assert!(encoded.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(CursorToken::decode(&encoded).unwrap(), token);
    }

    #[test]
    fn test_encoding_is_hex_of_the_json_object() {
        let token = CursorToken::new("30", "id-1");

        let encoded = token.encode();

        assert_eq!(
            hex::decode(&encoded).unwrap(),
            br#"{"after":"30","tiebreakerId":"id-1"}"#.to_vec()
        );
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("zz")]
    #[case("7b22é")]
    #[case("6869")]
    #[case("7b7d")]
    fn test_decode_rejects_malformed_tokens(#[case] token: &str) {
        assert!(matches!(
            CursorToken::decode(token),
            Err(DomainError::InvalidArgument(_))
        ));
    }
}
