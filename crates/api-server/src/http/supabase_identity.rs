use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use shared::config::AuthConfig;
use uuid::Uuid;

const MAX_CLOCK_SKEW_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub(super) struct VerifiedIdentity {
    pub(super) user_id: Uuid,
    pub(super) email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct IdentityError {
    pub(super) code: &'static str,
    pub(super) message: &'static str,
}

#[derive(Debug, Deserialize)]
struct SupabaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// Verifies an HS256 access token issued by Supabase auth.
pub(super) fn verify_access_token(
    auth: &AuthConfig,
    access_token: &str,
) -> Result<VerifiedIdentity, IdentityError> {
    if access_token.trim().is_empty() {
        return Err(IdentityError {
            code: "invalid_token",
            message: "Access token is required",
        });
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[auth.jwt_audience.as_str()]);
    if let Some(issuer) = auth.jwt_issuer.as_deref() {
        validation.set_issuer(&[issuer]);
    }
    validation.leeway = MAX_CLOCK_SKEW_SECONDS;
    validation.required_spec_claims = ["exp", "aud", "sub"]
        .into_iter()
        .map(str::to_string)
        .collect();

    let decoding_key = DecodingKey::from_secret(auth.jwt_secret.as_bytes());
    let token_data =
        decode::<SupabaseClaims>(access_token, &decoding_key, &validation).map_err(|err| {
            let (code, message) = match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ("expired_token", "Access token is expired")
                }
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    ("invalid_token", "Access token audience does not match")
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    ("invalid_token", "Access token issuer is invalid")
                }
                _ => ("invalid_token", "Access token validation failed"),
            };
            IdentityError { code, message }
        })?;

    let user_id = Uuid::parse_str(token_data.claims.sub.trim()).map_err(|_| IdentityError {
        code: "invalid_token",
        message: "Access token subject is not a user id",
    })?;
    let email = token_data
        .claims
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty());

    Ok(VerifiedIdentity { user_id, email })
}
