use crate::error::{AppError, AppResult};
use crate::models::Claims;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

/// Signs a session token for `user_id`. Returns the token and its expiry as a
/// unix timestamp.
pub fn create_jwt(user_id: i64, secret: &str, expires_in: &str) -> AppResult<(String, i64)> {
    let expiration = parse_duration(expires_in)?;
    let now = Utc::now();
    let exp = now
        .checked_add_signed(expiration)
        .ok_or_else(|| AppError::InternalServerError("Invalid expiration time".to_string()))?
        .timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        exp: Some(exp),
        iat: Some(now.timestamp()),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, exp))
}

pub fn verify_jwt(token: &str, secret: &str) -> AppResult<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

pub fn parse_duration(duration_str: &str) -> AppResult<Duration> {
    let duration_str = duration_str.trim();
    let invalid = || AppError::BadRequest("Invalid duration format".to_string());

    if let Some(hours) = duration_str.strip_suffix('h') {
        Ok(Duration::hours(hours.parse().map_err(|_| invalid())?))
    } else if let Some(days) = duration_str.strip_suffix('d') {
        Ok(Duration::days(days.parse().map_err(|_| invalid())?))
    } else if let Some(minutes) = duration_str.strip_suffix('m') {
        Ok(Duration::minutes(minutes.parse().map_err(|_| invalid())?))
    } else {
        // Default to hours
        Ok(Duration::hours(duration_str.parse().map_err(|_| invalid())?))
    }
}

/// Accepts both `Bearer <token>` and the `Token <token>` scheme used by
/// token-auth clients.
pub fn extract_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("Token "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
