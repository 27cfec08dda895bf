use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc, TimeZone};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{AuthUser, JwtClaims};

type HmacSha256 = Hmac<Sha256>;

/// Issue a signed HS256 token for a user. The system mints its own tokens
/// at login; `validate_token` is the inverse.
pub fn sign_token(
    user_id: &str,
    email: Option<&str>,
    role: &str,
    jwt_secret: &str,
    ttl: Duration,
) -> Result<String, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let now = Utc::now();
    let header = serde_json::json!({ "alg": "HS256", "typ": "JWT" });
    let claims = JwtClaims {
        sub: user_id.to_string(),
        exp: Some((now + ttl).timestamp() as u64),
        iat: Some(now.timestamp() as u64),
        email: email.map(|e| e.to_string()),
        role: Some(role.to_string()),
    };

    let claims_json = serde_json::to_string(&claims)
        .map_err(|_| "Failed to serialize claims".to_string())?;

    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims_json);
    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();

    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<AuthUser, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    // Split token into parts
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = match HmacSha256::new_from_slice(jwt_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return Err("Failed to create HMAC".to_string()),
    };

    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    // Decode claims
    let claims_json = match URL_SAFE_NO_PAD.decode(claims_b64) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(_) => return Err("Invalid claims encoding".to_string()),
    };

    let claims: JwtClaims = match serde_json::from_str(&claims_json) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse claims: {}", e);
            return Err("Invalid claims format".to_string());
        },
    };

    // Check expiration
    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let created_at = claims.iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = AuthUser {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

    #[test]
    fn sign_then_validate_roundtrip() {
        let token = sign_token(
            "8f9a2c1e-0000-0000-0000-000000000001",
            Some("patient@example.com"),
            "patient",
            SECRET,
            Duration::hours(24),
        ).unwrap();

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.id, "8f9a2c1e-0000-0000-0000-000000000001");
        assert_eq!(user.email.as_deref(), Some("patient@example.com"));
        assert_eq!(user.role.as_deref(), Some("patient"));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign_token("u1", None, "patient", SECRET, Duration::hours(-1)).unwrap();
        let err = validate_token(&token, SECRET).unwrap_err();
        assert_eq!(err, "Token expired");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = sign_token("u1", None, "admin", "some-other-secret", Duration::hours(1)).unwrap();
        let err = validate_token(&token, SECRET).unwrap_err();
        assert_eq!(err, "Invalid token signature");
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(validate_token("not-a-jwt", SECRET).is_err());
        assert!(validate_token("a.b", SECRET).is_err());
    }
}
