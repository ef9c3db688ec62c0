//! Server configuration read from the environment.
//!
//! Required:
//! - `DATABASE_URL` (or `SERVER_DATABASE_URL`)
//! - `JWT_SECRET`: HS256 signing secret, at least 32 bytes
//! - `ENCRYPTION_KEY`: base64 encoded 32-byte key for inbox credentials
//!
//! Optional: `HOST`, `PORT`, `JWT_ACCESS_TTL_MINUTES` (at most one week),
//! `JWT_REFRESH_TTL_DAYS` and `INVITATION_TTL_DAYS` (at most 3650),
//! `PUBLIC_BASE_URL`, `CORS_ALLOWED_ORIGINS`.

use std::{net::SocketAddr, str::FromStr};

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use services::services::auth::AuthConfig;
use thiserror::Error;

const MIN_JWT_SECRET_LEN: usize = 32;
const MAX_ACCESS_TTL_MINUTES: i64 = 7 * 24 * 60;
const MAX_TTL_DAYS: i64 = 3650;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable `{0}` is not set")]
    Missing(&'static str),
    #[error("environment variable `{var}` is invalid: {message}")]
    Invalid { var: &'static str, message: String },
}

/// Allowed CORS origins; `*` (the default) allows any origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            CorsOrigins::Any
        } else {
            CorsOrigins::List(origins)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: SecretString,
    pub host: String,
    pub port: u16,
    pub jwt_secret: SecretString,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub encryption_key: SecretString,
    pub public_base_url: String,
    pub invitation_ttl_days: i64,
    pub cors_origins: CorsOrigins,
}

fn var(name: &'static str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    var(name).ok_or(ConfigError::Missing(name))
}

fn parse_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: name,
            message: e.to_string(),
        }),
    }
}

/// Positive integer no greater than `max`.
fn bounded(name: &'static str, default: i64, max: i64) -> Result<i64, ConfigError> {
    let value = parse_or(name, default)?;
    if value <= 0 {
        return Err(ConfigError::Invalid {
            var: name,
            message: "must be positive".to_string(),
        });
    }
    if value > max {
        return Err(ConfigError::Invalid {
            var: name,
            message: format!("must be at most {max}"),
        });
    }
    Ok(value)
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = var("DATABASE_URL")
            .or_else(|| var("SERVER_DATABASE_URL"))
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = required("JWT_SECRET")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET",
                message: format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
            });
        }

        let public_base_url = var("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            database_url: SecretString::from(database_url),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", 3000)?,
            jwt_secret: SecretString::from(jwt_secret),
            access_ttl_minutes: bounded("JWT_ACCESS_TTL_MINUTES", 15, MAX_ACCESS_TTL_MINUTES)?,
            refresh_ttl_days: bounded("JWT_REFRESH_TTL_DAYS", 7, MAX_TTL_DAYS)?,
            encryption_key: SecretString::from(required("ENCRYPTION_KEY")?),
            public_base_url,
            invitation_ttl_days: bounded("INVITATION_TTL_DAYS", 7, MAX_TTL_DAYS)?,
            cors_origins: CorsOrigins::parse(&var("CORS_ALLOWED_ORIGINS").unwrap_or_default()),
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "HOST",
                message: e.to_string(),
            })
    }

    pub fn auth(&self) -> AuthConfig {
        AuthConfig {
            jwt_secret: SecretString::from(self.jwt_secret.expose_secret().to_owned()),
            access_ttl: Duration::minutes(self.access_ttl_minutes),
            refresh_ttl: Duration::days(self.refresh_ttl_days),
        }
    }

    pub fn invitation_ttl(&self) -> Duration {
        Duration::days(self.invitation_ttl_days)
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const VARS: [&str; 11] = [
        "DATABASE_URL",
        "SERVER_DATABASE_URL",
        "HOST",
        "PORT",
        "JWT_SECRET",
        "JWT_ACCESS_TTL_MINUTES",
        "JWT_REFRESH_TTL_DAYS",
        "ENCRYPTION_KEY",
        "PUBLIC_BASE_URL",
        "INVITATION_TTL_DAYS",
        "CORS_ALLOWED_ORIGINS",
    ];

    fn reset(values: &[(&str, &str)]) {
        unsafe {
            for name in VARS {
                std::env::remove_var(name);
            }
            for (name, value) in values {
                std::env::set_var(name, value);
            }
        }
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgres://localhost/taskosaur"),
            ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
            ("ENCRYPTION_KEY", "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="),
        ]
    }

    #[test]
    #[serial]
    fn defaults_apply_when_only_required_vars_are_set() {
        reset(&minimal());
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.access_ttl_minutes, 15);
        assert_eq!(config.refresh_ttl_days, 7);
        assert_eq!(config.invitation_ttl_days, 7);
        assert_eq!(config.public_base_url, "http://localhost:3000");
        assert_eq!(config.cors_origins, CorsOrigins::Any);
        assert_eq!(config.listen_addr().unwrap().to_string(), "0.0.0.0:3000");
        reset(&[]);
    }

    #[test]
    #[serial]
    fn missing_secret_is_reported() {
        let mut vars = minimal();
        vars.retain(|(name, _)| *name != "JWT_SECRET");
        reset(&vars);
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));
        reset(&[]);
    }

    #[test]
    #[serial]
    fn short_secret_and_bad_numbers_are_invalid() {
        let mut vars = minimal();
        vars.push(("JWT_SECRET", "too-short"));
        reset(&vars);
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::Invalid { var: "JWT_SECRET", .. })
        ));

        let mut vars = minimal();
        vars.push(("JWT_ACCESS_TTL_MINUTES", "0"));
        reset(&vars);
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::Invalid { var: "JWT_ACCESS_TTL_MINUTES", .. })
        ));
        reset(&[]);
    }

    #[test]
    #[serial]
    fn oversized_ttls_are_rejected_instead_of_overflowing() {
        for (name, value) in [
            ("INVITATION_TTL_DAYS", "9000000000000"),
            ("JWT_REFRESH_TTL_DAYS", "3651"),
            ("JWT_ACCESS_TTL_MINUTES", "9223372036854775807"),
        ] {
            let mut vars = minimal();
            vars.push((name, value));
            reset(&vars);
            match ServerConfig::from_env() {
                Err(ConfigError::Invalid { var, .. }) => assert_eq!(var, name),
                other => panic!("expected {name} to be invalid, got {other:?}"),
            }
        }

        let mut vars = minimal();
        vars.push(("INVITATION_TTL_DAYS", "3650"));
        vars.push(("JWT_ACCESS_TTL_MINUTES", "10080"));
        reset(&vars);
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.invitation_ttl(), Duration::days(3650));
        assert_eq!(config.auth().access_ttl, Duration::minutes(10080));
        reset(&[]);
    }

    #[test]
    #[serial]
    fn cors_origins_are_split_and_base_url_trimmed() {
        let mut vars = minimal();
        vars.push(("CORS_ALLOWED_ORIGINS", "https://a.test, https://b.test"));
        vars.push(("PUBLIC_BASE_URL", "https://app.test/"));
        reset(&vars);
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(
            config.cors_origins,
            CorsOrigins::List(vec!["https://a.test".into(), "https://b.test".into()])
        );
        assert_eq!(config.public_base_url, "https://app.test");
        reset(&[]);
    }
}
