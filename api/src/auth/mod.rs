pub mod claims;
pub mod extractors;
pub mod guards;
pub mod middleware;

pub use claims::{AuthUser, Claims};

use chrono::{Duration, Utc};
use db::models::user::Role;
use jsonwebtoken::{EncodingKey, Header, encode};
use util::config::AppConfig;

/// Generates a JWT and its RFC 3339 expiry for a subject.
pub fn generate_jwt(subject_id: &str, role: Role) -> Result<(String, String), jsonwebtoken::errors::Error> {
    let (secret, minutes) = {
        let cfg = AppConfig::global();
        (cfg.jwt_secret.clone(), cfg.jwt_duration_minutes)
    };

    let expiry = Utc::now() + Duration::minutes(minutes as i64);
    let claims = Claims {
        sub: subject_id.to_owned(),
        role,
        exp: expiry.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, expiry.to_rfc3339()))
}
