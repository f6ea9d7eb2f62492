use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, Validation, decode};

/// Decodes an access token. Refresh tokens are rejected.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())?;

    if claims.token_type != TokenType::Access {
        return Err("Access token required".to_string());
    }
    Ok(claims)
}

#[cfg(test)]
pub fn generate_access_token(
    user_id: u64,
    username: String,
    role: u8,
    clinic_id: u64,
    secret: &str,
    ttl: usize,
) -> String {
    sign(user_id, username, role, clinic_id, TokenType::Access, secret, ttl)
}

#[cfg(test)]
fn sign(
    user_id: u64,
    username: String,
    role: u8,
    clinic_id: u64,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::{SystemTime, UNIX_EPOCH};
    use uuid::Uuid;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;
    let claims = Claims {
        user_id,
        sub: username,
        role,
        exp: now + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
        clinic_id,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
