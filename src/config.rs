//! Runtime configuration, read from command-line flags or the environment.

use crate::error::{CheckoutError, Result};
use clap::Parser;
use secrecy::SecretString;
use std::net::SocketAddr;

pub const DEFAULT_GATEWAY_URL: &str = "https://api.mercadopago.com/v1";
pub const DEFAULT_STATEMENT_DESCRIPTOR: &str = "TV Fonomar";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address the HTTP server listens on
    #[arg(long, env = "CHECKOUT_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Base URL of the payment gateway's Orders API
    #[arg(long, env = "MERCADOPAGO_BASE_URL", default_value = DEFAULT_GATEWAY_URL)]
    pub gateway_url: String,

    /// Gateway access token. Requests fail with a configuration error until set.
    #[arg(long, env = "MERCADOPAGO_ACCESS_TOKEN", hide_env_values = true)]
    pub gateway_access_token: Option<String>,

    /// Timeout for each gateway request, in seconds
    #[arg(long, env = "MERCADOPAGO_TIMEOUT_SECS", default_value_t = 30)]
    pub gateway_timeout_secs: u64,

    /// Text printed on the payer's card statement
    #[arg(long, env = "CHECKOUT_STATEMENT_DESCRIPTOR", default_value = DEFAULT_STATEMENT_DESCRIPTOR)]
    pub statement_descriptor: String,

    #[arg(long, env = "MYSQL_HOST")]
    pub mysql_host: Option<String>,

    #[arg(long, env = "MYSQL_PORT", default_value_t = 3306)]
    pub mysql_port: u16,

    #[arg(long, env = "MYSQL_USER")]
    pub mysql_user: Option<String>,

    #[arg(long, env = "MYSQL_PASSWORD", default_value = "", hide_env_values = true)]
    pub mysql_password: String,

    #[arg(long, env = "MYSQL_DATABASE")]
    pub mysql_database: Option<String>,

    /// Maximum pooled database connections
    #[arg(long, env = "MYSQL_MAX_CONNECTIONS", default_value_t = 10)]
    pub mysql_max_connections: u32,

    /// Keep the event log in memory instead of MySQL (nothing is persisted)
    #[arg(long)]
    pub in_memory: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "CHECKOUT_LOG_JSON")]
    pub log_json: bool,
}

impl Cli {
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.gateway_url.clone(),
            access_token: self
                .gateway_access_token
                .clone()
                .filter(|t| !t.trim().is_empty())
                .map(SecretString::from),
            timeout_secs: self.gateway_timeout_secs,
        }
    }

    /// Database parameters, or a configuration error naming what is missing.
    pub fn database(&self) -> Result<DatabaseConfig> {
        let mut config = DatabaseConfig::from_parts(
            self.mysql_host.clone(),
            self.mysql_port,
            self.mysql_user.clone(),
            self.mysql_password.clone(),
            self.mysql_database.clone(),
        )?;
        config.max_connections = self.mysql_max_connections;
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub access_token: Option<SecretString>,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            access_token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn from_parts(
        host: Option<String>,
        port: u16,
        user: Option<String>,
        password: String,
        database: Option<String>,
    ) -> Result<Self> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let (host, user, database) = (present(host), present(user), present(database));

        let missing: Vec<&str> = [
            ("MYSQL_HOST", host.is_none()),
            ("MYSQL_USER", user.is_none()),
            ("MYSQL_DATABASE", database.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

        match (host, user, database) {
            (Some(host), Some(user), Some(database)) => Ok(Self {
                host,
                port,
                user,
                password: SecretString::from(password),
                database,
                max_connections: 10,
                acquire_timeout_secs: 10,
            }),
            _ => Err(CheckoutError::ConfigError(format!(
                "missing database parameters: {}",
                missing.join(", ")
            ))),
        }
    }
}
