use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub media_root: PathBuf,
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, Error> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_e| Error::Validation(format!("{key} has an invalid value: {value}"))),
        None => Ok(default),
    }
}

impl Config {
    /// Reads the process environment, after loading `.env` when one exists.
    pub fn init() -> Result<Config, Error> {
        dotenvy::dotenv().ok();
        Config::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let server_port = parse_or("PORT", lookup("PORT"), 8000)?;
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let database_max_connections =
            parse_or("DATABASE_MAX_CONNECTIONS", lookup("DATABASE_MAX_CONNECTIONS"), 5)?;
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| Error::Validation(String::from("JWT_SECRET must be set")))?;
        let media_root = lookup("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("media"));

        Ok(Config {
            server_host,
            server_port,
            database_url,
            database_max_connections,
            jwt_secret,
            media_root,
        })
    }

    pub fn address(&self) -> Result<SocketAddr, Error> {
        format!("{}:{}", self.server_host, self.server_port)
            .parse()
            .map_err(|_e| Error::Validation(format!("Invalid HOST: {}", self.server_host)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn falls_back_to_defaults() {
        let config = config(&[("JWT_SECRET", "secret")]).unwrap();
        assert_eq!(config.server_port, 8000);
        assert_eq!(config.database_url, None);
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.media_root, PathBuf::from("media"));
        assert_eq!(config.address().unwrap().to_string(), "0.0.0.0:8000");
    }

    #[test]
    fn secret_is_required() {
        assert!(config(&[]).is_err());
    }

    #[test]
    fn bad_port_is_an_error() {
        let error = config(&[("JWT_SECRET", "secret"), ("PORT", "eighty")]).unwrap_err();
        assert!(error.to_string().contains("PORT"));
    }
}
