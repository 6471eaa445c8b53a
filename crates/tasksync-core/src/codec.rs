//! Credential encoding at the storage boundary.
//!
//! Connection data is serialised to JSON and stored as base64 text. Every
//! repository read and write calls [`CredentialCodec`] explicitly.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Encodes connection payloads for the credentials columns
pub struct CredentialCodec;

impl CredentialCodec {
    /// Serialise `value` into the stored text form
    pub fn encode<T: Serialize>(value: &T) -> Result<String> {
        let json = serde_json::to_vec(value)?;
        Ok(STANDARD.encode(json))
    }

    /// Decode a stored column back into `T`
    pub fn decode<T: DeserializeOwned>(stored: &str) -> Result<T> {
        let bytes = STANDARD
            .decode(stored.trim())
            .map_err(|error| Error::Codec(format!("invalid base64: {error}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|error| Error::Codec(format!("invalid credential payload: {error}")))
    }

    /// Encode an optional payload, keeping `None` as SQL NULL
    pub fn encode_optional<T: Serialize>(value: Option<&T>) -> Result<Option<String>> {
        value.map(Self::encode).transpose()
    }

    /// Decode an optional column
    pub fn decode_optional<T: DeserializeOwned>(stored: Option<&str>) -> Result<Option<T>> {
        stored.map(Self::decode).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotionConnection, NotionCredentials};

    fn connection() -> NotionConnection {
        let mut connection = NotionConnection::new(NotionCredentials {
            access_token: "secret_abc".to_string(),
            workspace_id: None,
            workspace_name: Some("Home".to_string()),
            bot_id: None,
        });
        connection.database_id = Some("db-1".to_string());
        connection
    }

    #[test]
    fn encoded_value_does_not_contain_plain_token() {
        let encoded = CredentialCodec::encode(&connection()).unwrap();
        assert!(!encoded.contains("secret_abc"));
        let decoded: NotionConnection = CredentialCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, connection());
    }

    #[test]
    fn decode_rejects_corrupt_values() {
        let err = CredentialCodec::decode::<NotionConnection>("not base64!").unwrap_err();
        assert!(matches!(err, Error::Codec(_)));

        let not_json = STANDARD.encode("plain");
        let err = CredentialCodec::decode::<NotionConnection>(&not_json).unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[test]
    fn optional_values_stay_null() {
        assert_eq!(
            CredentialCodec::encode_optional::<NotionConnection>(None).unwrap(),
            None
        );
        assert_eq!(
            CredentialCodec::decode_optional::<NotionConnection>(None).unwrap(),
            None
        );
    }
}
