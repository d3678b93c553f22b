//! Attendance token codec.
//!
//! A token binds a subject to a session at an issuance instant. The integrity
//! tag is HMAC-SHA256 over the canonical JSON of exactly those three fields,
//! hex encoded. Everything here is pure; the key is always passed in.

use crate::error::AttendanceError;
use crate::settings::QrSecret;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Wire form of an attendance token, as encoded in a QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceToken {
    pub subject_id: String,
    pub session_id: String,
    /// Unix seconds.
    pub issued_at: i64,
    pub integrity_tag: String,
}

impl AttendanceToken {
    /// JSON handed to the client and stored as the session's raw payload.
    pub fn serialize(&self) -> String {
        serde_json::json!({
            "subjectId": self.subject_id,
            "sessionId": self.session_id,
            "issuedAt": self.issued_at,
            "integrityTag": self.integrity_tag,
        })
        .to_string()
    }
}

fn keyed(secret: &QrSecret) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length")
}

/// Canonical byte form covered by the tag. `serde_json::Map` keeps keys
/// sorted, so the field order is fixed regardless of input order.
fn canonical(subject_id: &str, session_id: &str, issued_at: i64) -> Vec<u8> {
    serde_json::json!({
        "subjectId": subject_id,
        "sessionId": session_id,
        "issuedAt": issued_at,
    })
    .to_string()
    .into_bytes()
}

pub fn compute_tag(secret: &QrSecret, subject_id: &str, session_id: &str, issued_at: i64) -> String {
    let mut mac = keyed(secret);
    mac.update(&canonical(subject_id, session_id, issued_at));
    hex::encode(mac.finalize().into_bytes())
}

pub fn encode(secret: &QrSecret, subject_id: &str, session_id: &str, issued_at: i64) -> AttendanceToken {
    AttendanceToken {
        subject_id: subject_id.to_owned(),
        session_id: session_id.to_owned(),
        issued_at,
        integrity_tag: compute_tag(secret, subject_id, session_id, issued_at),
    }
}

/// Parses a serialized token. Missing, mistyped or empty fields are
/// `MalformedPayload`; unknown extra fields are ignored.
pub fn decode(serialized: &str) -> Result<AttendanceToken, AttendanceError> {
    let token: AttendanceToken = serde_json::from_str(serialized.trim())
        .map_err(|e| AttendanceError::MalformedPayload(e.to_string()))?;

    for (name, value) in [
        ("subjectId", &token.subject_id),
        ("sessionId", &token.session_id),
        ("integrityTag", &token.integrity_tag),
    ] {
        if value.trim().is_empty() {
            return Err(AttendanceError::MalformedPayload(format!("{name} is empty")));
        }
    }

    Ok(token)
}

/// Recomputes the tag and compares in constant time.
pub fn verify_integrity(token: &AttendanceToken, secret: &QrSecret) -> bool {
    let Ok(presented) = hex::decode(&token.integrity_tag) else {
        return false;
    };
    let mut mac = keyed(secret);
    mac.update(&canonical(&token.subject_id, &token.session_id, token.issued_at));
    mac.verify_slice(&presented).is_ok()
}

/// `hex(SHA-256(subject ‖ issued_at ‖ 16 random bytes))`, 64 characters.
pub fn generate_session_id(subject_id: &str, issued_at: i64) -> String {
    let mut nonce = [0u8; 16];
    rand::rng().fill_bytes(&mut nonce);

    let mut hasher = Sha256::new();
    hasher.update(subject_id.as_bytes());
    hasher.update(issued_at.to_be_bytes());
    hasher.update(nonce);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn secret() -> QrSecret {
        QrSecret::new("unit-test-secret")
    }

    fn sample() -> AttendanceToken {
        encode(&secret(), "S-001", "5e55", 1_704_096_000)
    }

    fn reserialize(token: &AttendanceToken, field: &str, value: Value) -> String {
        let mut json: Value = serde_json::from_str(&token.serialize()).unwrap();
        json[field] = value;
        json.to_string()
    }

    #[test]
    fn test_round_trip_preserves_fields_and_tag() {
        let token = sample();
        let decoded = decode(&token.serialize()).unwrap();

        assert_eq!(decoded, token);
        assert!(verify_integrity(&decoded, &secret()));
    }

    #[test]
    fn test_wrong_secret_fails_integrity() {
        let token = sample();
        assert!(!verify_integrity(&token, &QrSecret::new("other-secret")));
    }

    #[test]
    fn test_single_field_mutations_fail_integrity() {
        let token = sample();
        let mut flipped_tag = token.integrity_tag.clone();
        let last = if flipped_tag.ends_with('0') { "1" } else { "0" };
        flipped_tag.replace_range(flipped_tag.len() - 1.., last);

        let cases = [
            ("subjectId", Value::from("S-002")),
            ("sessionId", Value::from("5e56")),
            ("issuedAt", Value::from(1_704_096_001_i64)),
            ("integrityTag", Value::from(flipped_tag)),
        ];

        for (field, value) in cases {
            let tampered = decode(&reserialize(&token, field, value)).unwrap();
            assert!(!verify_integrity(&tampered, &secret()), "mutating {field} went unnoticed");
        }
    }

    #[test]
    fn test_non_hex_tag_fails_integrity() {
        let mut token = sample();
        token.integrity_tag = "not-hex".into();
        assert!(!verify_integrity(&token, &secret()));
    }

    #[test]
    fn test_field_order_does_not_change_tag() {
        let token = sample();
        let reordered = format!(
            r#"{{"integrityTag":"{}","issuedAt":{},"sessionId":"{}","subjectId":"{}"}}"#,
            token.integrity_tag, token.issued_at, token.session_id, token.subject_id
        );
        assert!(verify_integrity(&decode(&reordered).unwrap(), &secret()));
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        let bad = [
            "",
            "not json",
            "#42",
            r#"{"subjectId":"S-001","sessionId":"x","issuedAt":1}"#,
            r#"{"subjectId":"S-001","sessionId":"x","issuedAt":"1","integrityTag":"ab"}"#,
            r#"{"subjectId":"","sessionId":"x","issuedAt":1,"integrityTag":"ab"}"#,
        ];
        for raw in bad {
            assert!(
                matches!(decode(raw), Err(AttendanceError::MalformedPayload(_))),
                "accepted {raw:?}"
            );
        }
    }

    #[test]
    fn test_session_ids_are_unique_and_sized() {
        let a = generate_session_id("S-001", 1_704_096_000);
        let b = generate_session_id("S-001", 1_704_096_000);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}
