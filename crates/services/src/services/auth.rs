//! Password authentication and JWT access/refresh tokens.
//!
//! Refresh tokens rotate: the SHA-256 of the latest one is stored on the
//! user row, and a refresh is only honoured for that exact token.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use db::{
    models::user::{CreateUser, User},
    validation,
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::error::ServiceError;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
    #[error("wrong token type")]
    WrongType,
}

impl From<TokenError> for ServiceError {
    fn from(error: TokenError) -> Self {
        ServiceError::Unauthorized(error.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub token_type: TokenType,
    /// Unique per token so two refresh tokens issued in the same second differ.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct AuthResponse {
    pub user: User,
    #[serde(flatten)]
    #[ts(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

const MAX_USERNAME_LEN: usize = 50;

#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    pub fn issue_tokens(&self, user: &User) -> Result<TokenPair, ServiceError> {
        let access_token = self.encode(user, TokenType::Access, self.access_ttl)?;
        let refresh_token = self.encode(user, TokenType::Refresh, self.refresh_ttl)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    fn encode(&self, user: &User, token_type: TokenType, ttl: Duration) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            token_type,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(format!("token encoding failed: {e}")))
    }

    /// Decodes a token and checks its signature, expiry and type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        if token.trim().is_empty() {
            return Err(TokenError::Invalid);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.required_spec_claims =
            HashSet::from(["sub".to_string(), "exp".to_string()]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        if data.claims.token_type != expected {
            return Err(TokenError::WrongType);
        }
        Ok(data.claims)
    }

    /// Issues tokens and stores the refresh token hash, replacing any earlier one.
    async fn start_session(&self, pool: &PgPool, user: &User) -> Result<TokenPair, ServiceError> {
        let tokens = self.issue_tokens(user)?;
        User::set_refresh_token_hash(pool, user.id, Some(&hash_token(&tokens.refresh_token))).await?;
        Ok(tokens)
    }

    pub async fn register(
        &self,
        pool: &PgPool,
        request: RegisterRequest,
    ) -> Result<AuthResponse, ServiceError> {
        let email = validation::email(&request.email)?;
        let username = validation::required_text("username", &request.username, MAX_USERNAME_LEN)?;
        let first_name = validation::name("first_name", &request.first_name)?;
        let last_name = validation::name("last_name", &request.last_name)?;
        validation::password(&request.password)?;

        let password_hash = hash_password(request.password).await?;
        let user = User::create(
            pool,
            &CreateUser {
                email,
                username,
                first_name,
                last_name,
                password_hash,
            },
        )
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                let field = match db::violated_constraint(&e) {
                    Some(c) if c.contains("username") => "username",
                    _ => "email",
                };
                ServiceError::conflict(format!("{field} is already registered"))
            } else {
                e.into()
            }
        })?;

        tracing::info!(user_id = %user.id, "user registered");
        let tokens = self.start_session(pool, &user).await?;
        Ok(AuthResponse { user, tokens })
    }

    pub async fn login(&self, pool: &PgPool, request: LoginRequest) -> Result<AuthResponse, ServiceError> {
        let invalid = || ServiceError::Unauthorized("invalid email or password".to_string());

        let email = request.email.trim().to_lowercase();
        let user = User::find_by_email(pool, &email).await?.ok_or_else(invalid)?;
        if !verify_password(request.password, user.password_hash.clone()).await? {
            tracing::debug!(user_id = %user.id, "login rejected: wrong password");
            return Err(invalid());
        }
        if !user.is_active() {
            return Err(ServiceError::Unauthorized("account is not active".to_string()));
        }

        User::touch_last_login(pool, user.id).await?;
        let tokens = self.start_session(pool, &user).await?;
        Ok(AuthResponse { user, tokens })
    }

    pub async fn refresh(&self, pool: &PgPool, refresh_token: &str) -> Result<AuthResponse, ServiceError> {
        let claims = self.verify(refresh_token, TokenType::Refresh)?;
        let user = User::find_by_id(pool, claims.sub)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("user not found".to_string()))?;
        if !user.is_active() {
            return Err(ServiceError::Unauthorized("account is not active".to_string()));
        }
        if user.refresh_token_hash.as_deref() != Some(hash_token(refresh_token).as_str()) {
            tracing::warn!(user_id = %user.id, "refresh token reuse or revoked session");
            return Err(ServiceError::Unauthorized("refresh token revoked".to_string()));
        }

        let tokens = self.start_session(pool, &user).await?;
        Ok(AuthResponse { user, tokens })
    }

    pub async fn logout(&self, pool: &PgPool, user_id: Uuid) -> Result<(), ServiceError> {
        User::set_refresh_token_hash(pool, user_id, None).await?;
        Ok(())
    }

    /// Changing the password also revokes the current refresh token.
    pub async fn change_password(
        &self,
        pool: &PgPool,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        let user = User::find_by_id(pool, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user"))?;
        if !verify_password(request.current_password, user.password_hash).await? {
            return Err(ServiceError::bad_request("current password is incorrect"));
        }
        validation::password(&request.new_password)?;

        let password_hash = hash_password(request.new_password).await?;
        User::set_password_hash(pool, user_id, &password_hash).await?;
        tracing::info!(%user_id, "password changed");
        Ok(())
    }

    /// Resolves the user behind an access token for request authentication.
    pub async fn authenticate(&self, pool: &PgPool, access_token: &str) -> Result<User, ServiceError> {
        let claims = self.verify(access_token, TokenType::Access)?;
        let user = User::find_by_id(pool, claims.sub)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("user not found".to_string()))?;
        if !user.is_active() {
            return Err(ServiceError::Unauthorized("account is not active".to_string()));
        }
        Ok(user)
    }
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// bcrypt is CPU-bound, so it runs on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| ServiceError::Internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| ServiceError::Internal(format!("password hashing failed: {e}")))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, ServiceError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ServiceError::Internal(format!("password verification task failed: {e}")))?
        .or(Ok(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::models::user::{UserRole, UserStatus};

    fn service(access_minutes: i64) -> AuthService {
        AuthService::new(&AuthConfig {
            jwt_secret: SecretString::from("test-secret-that-is-long-enough-123456"),
            access_ttl: Duration::minutes(access_minutes),
            refresh_ttl: Duration::days(7),
        })
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            username: "ada".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            password_hash: String::new(),
            avatar: None,
            bio: None,
            timezone: "UTC".into(),
            role: UserRole::User,
            status: UserStatus::Active,
            refresh_token_hash: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn issued_tokens_verify_with_their_type() {
        let auth = service(15);
        let user = user();
        let tokens = auth.issue_tokens(&user).unwrap();

        let claims = auth.verify(&tokens.access_token, TokenType::Access).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(tokens.expires_in, 15 * 60);
        assert!(matches!(
            auth.verify(&tokens.access_token, TokenType::Refresh),
            Err(TokenError::WrongType)
        ));
        assert!(auth.verify(&tokens.refresh_token, TokenType::Refresh).is_ok());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let auth = service(-5);
        let tokens = auth.issue_tokens(&user()).unwrap();
        assert!(matches!(
            auth.verify(&tokens.access_token, TokenType::Access),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn tokens_from_another_secret_are_invalid() {
        let other = AuthService::new(&AuthConfig {
            jwt_secret: SecretString::from("a-completely-different-secret-0987654321"),
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
        });
        let tokens = other.issue_tokens(&user()).unwrap();
        assert!(matches!(
            service(15).verify(&tokens.access_token, TokenType::Access),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(service(15).verify("  ", TokenType::Access), Err(TokenError::Invalid)));
    }

    #[test]
    fn refresh_tokens_are_unique() {
        let auth = service(15);
        let user = user();
        let a = auth.issue_tokens(&user).unwrap();
        let b = auth.issue_tokens(&user).unwrap();
        assert_ne!(hash_token(&a.refresh_token), hash_token(&b.refresh_token));
    }

    #[tokio::test]
    async fn password_hash_round_trip() {
        let hash = hash_password("correct horse".into()).await.unwrap();
        assert!(verify_password("correct horse".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrong".into(), hash).await.unwrap());
        assert!(!verify_password("x".into(), "not-a-hash".into()).await.unwrap());
    }
}
