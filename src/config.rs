use std::{env, net::SocketAddr, path::PathBuf};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub cookie_secret: String,
    /// Accounts registered with this email get the admin role.
    pub admin_email: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://cycle.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("static/uploads"));

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-cycle-together-cookie-secret".to_string());
        if cookie_secret.len() < 16 {
            return Err(AppError::Config(
                "COOKIE_SECRET must be at least 16 characters".into(),
            ));
        }

        let admin_email = env::var("ADMIN_EMAIL")
            .ok()
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty());

        Ok(Self {
            database_url,
            listen_addr,
            upload_dir,
            cookie_secret,
            admin_email,
        })
    }
}
