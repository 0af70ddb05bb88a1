//! Environment configuration

use anyhow::{Context, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub nats_url: Option<String>,
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
            port: std::env::var("PORT").unwrap_or_else(|_| "8083".to_string()).parse().context("PORT is not a number")?,
            nats_url: std::env::var("NATS_URL").ok(),
            jwt_secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
        })
    }
}
