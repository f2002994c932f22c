use std::env;

use crate::auth::DEV_SECRET;

/// Runtime configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub jwt_secret: String,
}

impl Config {
    /// Reads configuration from the environment.
    ///
    /// `JWT_SECRET` is mandatory. The historical embedded default
    /// (`"secretkey"`) is only honored when `MINISOCIAL_INSECURE_DEV_SECRET=1`
    /// is set explicitly, and a warning is logged.
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://minisocial.sqlite?mode=rwc".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if env::var("MINISOCIAL_INSECURE_DEV_SECRET").as_deref() == Ok("1") => {
                tracing::warn!(
                    "JWT_SECRET is unset; using the insecure development secret. \
                     Do not run this in production."
                );
                DEV_SECRET.to_string()
            }
            _ => anyhow::bail!(
                "JWT_SECRET must be set (or set MINISOCIAL_INSECURE_DEV_SECRET=1 \
                 to accept the insecure development default)"
            ),
        };

        Ok(Self {
            bind_addr,
            database_url,
            jwt_secret,
        })
    }
}
