//! Artifact model types shared by every storage backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known payload field names.
///
/// The shape of the payload document is part of the storage contract:
/// callers must place grouping/session/code identifiers at these locations
/// if they want indexed lookup.
pub mod payload_fields {
    /// Grouping key used for cascading deletion.
    pub const GRANT_ID: &str = "grantId";
    /// User-session identifier (secondary key A).
    pub const UID: &str = "uid";
    /// Device-flow one-time user code (secondary key B).
    pub const USER_CODE: &str = "userCode";
    /// Federation key URL, matched document-internally for the client kind.
    pub const JWKS_URI: &str = "jwks_uri";
    /// Epoch-seconds marker written by the consume operation.
    pub const CONSUMED: &str = "consumed";
}

/// The artifact kinds produced by the identity-provider runtime.
///
/// Each kind gets its own kind-scoped store handle; all kinds share the
/// same underlying table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    Session,
    AccessToken,
    AuthorizationCode,
    RefreshToken,
    DeviceCode,
    ClientCredentials,
    Client,
    InitialAccessToken,
    RegistrationAccessToken,
    Interaction,
    ReplayDetection,
    PushedAuthorizationRequest,
    Grant,
    BackchannelAuthenticationRequest,
}

impl ArtifactKind {
    /// All kinds, in declaration order.
    pub const ALL: [ArtifactKind; 14] = [
        Self::Session,
        Self::AccessToken,
        Self::AuthorizationCode,
        Self::RefreshToken,
        Self::DeviceCode,
        Self::ClientCredentials,
        Self::Client,
        Self::InitialAccessToken,
        Self::RegistrationAccessToken,
        Self::Interaction,
        Self::ReplayDetection,
        Self::PushedAuthorizationRequest,
        Self::Grant,
        Self::BackchannelAuthenticationRequest,
    ];

    /// Returns the canonical name stored in the `kind` column.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "Session",
            Self::AccessToken => "AccessToken",
            Self::AuthorizationCode => "AuthorizationCode",
            Self::RefreshToken => "RefreshToken",
            Self::DeviceCode => "DeviceCode",
            Self::ClientCredentials => "ClientCredentials",
            Self::Client => "Client",
            Self::InitialAccessToken => "InitialAccessToken",
            Self::RegistrationAccessToken => "RegistrationAccessToken",
            Self::Interaction => "Interaction",
            Self::ReplayDetection => "ReplayDetection",
            Self::PushedAuthorizationRequest => "PushedAuthorizationRequest",
            Self::Grant => "Grant",
            Self::BackchannelAuthenticationRequest => "BackchannelAuthenticationRequest",
        }
    }

    /// Returns `true` for kinds whose payload carries a grant grouping key.
    ///
    /// Only these kinds participate in cascading deletion by grant id.
    #[must_use]
    pub fn is_grant_bearing(&self) -> bool {
        matches!(
            self,
            Self::AccessToken
                | Self::AuthorizationCode
                | Self::RefreshToken
                | Self::DeviceCode
                | Self::BackchannelAuthenticationRequest
        )
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown artifact kind name.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown artifact kind: {0}")]
pub struct UnknownKindError(pub String);

impl FromStr for ArtifactKind {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKindError(s.to_string()))
    }
}

/// Indexed columns derived from a payload document at upsert time.
///
/// Which payload fields are consulted is declared per artifact kind, so a
/// new kind can opt into indexed lookup without touching the store
/// implementations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexedFields {
    /// Grouping key for cascading deletion (`grantId`).
    pub grant_id: Option<String>,
    /// User-session identifier (`uid`), secondary key A.
    pub uid: Option<String>,
    /// Device-flow user code (`userCode`), secondary key B.
    pub user_code: Option<String>,
}

impl IndexedFields {
    /// Extracts the indexed columns for `kind` from `payload`.
    ///
    /// Fields a kind does not declare are left `None` even when the payload
    /// happens to carry a value at the well-known location.
    #[must_use]
    pub fn extract(kind: ArtifactKind, payload: &Value) -> Self {
        let field = |name: &str| {
            payload
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_owned)
        };

        Self {
            grant_id: if kind.is_grant_bearing() {
                field(payload_fields::GRANT_ID)
            } else {
                None
            },
            uid: if kind == ArtifactKind::Session {
                field(payload_fields::UID)
            } else {
                None
            },
            user_code: if kind == ArtifactKind::DeviceCode {
                field(payload_fields::USER_CODE)
            } else {
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_round_trip() {
        for kind in ArtifactKind::ALL {
            assert_eq!(kind.as_str().parse::<ArtifactKind>().unwrap(), kind);
        }

        assert!("NotAKind".parse::<ArtifactKind>().is_err());
    }

    #[test]
    fn test_kind_serde_names() {
        let json = serde_json::to_string(&ArtifactKind::DeviceCode).unwrap();
        assert_eq!(json, "\"DeviceCode\"");

        let kind: ArtifactKind = serde_json::from_str("\"AccessToken\"").unwrap();
        assert_eq!(kind, ArtifactKind::AccessToken);
    }

    #[test]
    fn test_extract_device_code_fields() {
        let payload = json!({
            "grantId": "grant-1",
            "userCode": "ABCD-1234",
            "uid": "ignored-for-this-kind",
        });

        let fields = IndexedFields::extract(ArtifactKind::DeviceCode, &payload);
        assert_eq!(fields.grant_id.as_deref(), Some("grant-1"));
        assert_eq!(fields.user_code.as_deref(), Some("ABCD-1234"));
        assert_eq!(fields.uid, None);
    }

    #[test]
    fn test_extract_session_fields() {
        let payload = json!({ "uid": "sess-uid-9", "grantId": "g" });

        let fields = IndexedFields::extract(ArtifactKind::Session, &payload);
        assert_eq!(fields.uid.as_deref(), Some("sess-uid-9"));
        // Sessions are not grant-bearing.
        assert_eq!(fields.grant_id, None);
        assert_eq!(fields.user_code, None);
    }

    #[test]
    fn test_extract_non_indexed_kind() {
        let payload = json!({
            "grantId": "g",
            "uid": "u",
            "userCode": "c",
            "jwks_uri": "https://issuer/jwks",
        });

        let fields = IndexedFields::extract(ArtifactKind::Client, &payload);
        assert_eq!(fields, IndexedFields::default());
    }

    #[test]
    fn test_extract_missing_and_non_string_fields() {
        let fields = IndexedFields::extract(ArtifactKind::AccessToken, &json!({}));
        assert_eq!(fields.grant_id, None);

        // A non-string value at a well-known location is not indexed.
        let fields =
            IndexedFields::extract(ArtifactKind::AccessToken, &json!({ "grantId": 42 }));
        assert_eq!(fields.grant_id, None);
    }

    #[test]
    fn test_grant_bearing_kinds() {
        assert!(ArtifactKind::AuthorizationCode.is_grant_bearing());
        assert!(ArtifactKind::BackchannelAuthenticationRequest.is_grant_bearing());
        assert!(!ArtifactKind::Session.is_grant_bearing());
        assert!(!ArtifactKind::Client.is_grant_bearing());
        assert!(!ArtifactKind::Grant.is_grant_bearing());
    }
}
