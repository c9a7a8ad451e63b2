//! Runtime configuration
//!
//! Settings come from three layers, later layers winning: built-in defaults,
//! an optional TOML file (~/.msetrack/config.toml), and environment
//! variables. Mail credentials keep the EMAIL_USER / EMAIL_PASS / EMAIL_TO
//! names; everything else uses the MSETRACK_ prefix.

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAINBOARD_URL: &str = "https://mse.co.mw/market/mainboard";
pub const DEFAULT_RUN_TIME: &str = "16:00";
pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP submission settings for run notifications
#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub user: String,
    pub pass: String,
    pub to: String,
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Mainboard page to scrape
    pub url: String,
    /// Wall-clock time of the daily run
    pub run_time: NaiveTime,
    pub db_path: PathBuf,
    pub workbook_path: PathBuf,
    /// None disables notifications (credentials not supplied)
    pub email: Option<EmailSettings>,
}

/// TOML file shape; every field optional so partial files work
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    url: Option<String>,
    run_time: Option<String>,
    db_path: Option<PathBuf>,
    workbook_path: Option<PathBuf>,
    email: Option<FileEmailConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FileEmailConfig {
    smtp_server: Option<String>,
    smtp_port: Option<u16>,
    user: Option<String>,
    pass: Option<String>,
    to: Option<String>,
}

/// Partially-resolved settings before validation
#[derive(Debug, Clone)]
struct Builder {
    url: String,
    run_time: String,
    db_path: Option<PathBuf>,
    workbook_path: Option<PathBuf>,
    smtp_server: String,
    smtp_port: u16,
    email_user: Option<String>,
    email_pass: Option<String>,
    email_to: Option<String>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            url: DEFAULT_MAINBOARD_URL.to_string(),
            run_time: DEFAULT_RUN_TIME.to_string(),
            db_path: None,
            workbook_path: None,
            smtp_server: DEFAULT_SMTP_SERVER.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            email_user: None,
            email_pass: None,
            email_to: None,
        }
    }
}

impl Builder {
    fn apply_file(&mut self, file: FileConfig) {
        if let Some(url) = file.url {
            self.url = url;
        }
        if let Some(run_time) = file.run_time {
            self.run_time = run_time;
        }
        if file.db_path.is_some() {
            self.db_path = file.db_path;
        }
        if file.workbook_path.is_some() {
            self.workbook_path = file.workbook_path;
        }
        if let Some(email) = file.email {
            if let Some(server) = email.smtp_server {
                self.smtp_server = server;
            }
            if let Some(port) = email.smtp_port {
                self.smtp_port = port;
            }
            if email.user.is_some() {
                self.email_user = email.user;
            }
            if email.pass.is_some() {
                self.email_pass = email.pass;
            }
            if email.to.is_some() {
                self.email_to = email.to;
            }
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("MSETRACK_URL") {
            self.url = url;
        }
        if let Some(run_time) = lookup("MSETRACK_RUN_TIME") {
            self.run_time = run_time;
        }
        if let Some(path) = lookup("MSETRACK_DB_PATH") {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("MSETRACK_WORKBOOK_PATH") {
            self.workbook_path = Some(PathBuf::from(path));
        }
        if let Some(server) = lookup("MSETRACK_SMTP_SERVER") {
            self.smtp_server = server;
        }
        if let Some(port) = lookup("MSETRACK_SMTP_PORT") {
            self.smtp_port = port
                .parse()
                .with_context(|| format!("Invalid MSETRACK_SMTP_PORT '{}'", port))?;
        }
        if let Some(user) = lookup("EMAIL_USER") {
            self.email_user = Some(user);
        }
        if let Some(pass) = lookup("EMAIL_PASS") {
            self.email_pass = Some(pass);
        }
        if let Some(to) = lookup("EMAIL_TO") {
            self.email_to = Some(to);
        }
        Ok(())
    }

    fn finish(self) -> Result<Config> {
        let run_time = NaiveTime::parse_from_str(&self.run_time, "%H:%M")
            .with_context(|| format!("Invalid run time '{}', expected HH:MM", self.run_time))?;

        let data_dir = default_data_dir()?;
        let db_path = self.db_path.unwrap_or_else(|| data_dir.join("data.db"));
        let workbook_path = self
            .workbook_path
            .unwrap_or_else(|| data_dir.join("mse_daily.xlsx"));

        // Notifications need all three of user/pass/recipient
        let email = match (self.email_user, self.email_pass, self.email_to) {
            (Some(user), Some(pass), Some(to)) => Some(EmailSettings {
                smtp_server: self.smtp_server,
                smtp_port: self.smtp_port,
                user,
                pass,
                to,
            }),
            _ => None,
        };

        Ok(Config {
            url: self.url,
            run_time,
            db_path,
            workbook_path,
            email,
        })
    }
}

/// Default data directory (~/.msetrack)
fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".msetrack"))
}

/// Default config file path (~/.msetrack/config.toml)
pub fn default_config_path() -> Result<PathBuf> {
    Ok(default_data_dir()?.join("config.toml"))
}

impl Config {
    /// Load configuration: defaults, then the TOML file (if present), then
    /// environment variables.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };

        let mut builder = Builder::default();

        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            let file: FileConfig = toml::from_str(&raw)
                .with_context(|| format!("Failed to parse config file {:?}", path))?;
            builder.apply_file(file);
        }

        builder.apply_env(|key| std::env::var(key).ok())?;
        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let mut builder = Builder::default();
        builder.apply_env(no_env).unwrap();
        let config = builder.finish().unwrap();

        assert_eq!(config.url, DEFAULT_MAINBOARD_URL);
        assert_eq!(config.run_time.hour(), 16);
        assert_eq!(config.run_time.minute(), 0);
        assert!(config.email.is_none());
        assert!(config.db_path.ends_with(".msetrack/data.db"));
        assert!(config.workbook_path.ends_with(".msetrack/mse_daily.xlsx"));
    }

    #[test]
    fn test_file_config_overrides_defaults() {
        let raw = r#"
            url = "https://example.test/board"
            run_time = "09:30"
            db_path = "/tmp/mse/test.db"

            [email]
            user = "scraper@example.test"
            pass = "secret"
            to = "alerts@example.test"
        "#;
        let file: FileConfig = toml::from_str(raw).unwrap();

        let mut builder = Builder::default();
        builder.apply_file(file);
        builder.apply_env(no_env).unwrap();
        let config = builder.finish().unwrap();

        assert_eq!(config.url, "https://example.test/board");
        assert_eq!(config.run_time.hour(), 9);
        assert_eq!(config.run_time.minute(), 30);
        assert_eq!(config.db_path, PathBuf::from("/tmp/mse/test.db"));

        let email = config.email.expect("email should be configured");
        assert_eq!(email.smtp_server, DEFAULT_SMTP_SERVER);
        assert_eq!(email.smtp_port, DEFAULT_SMTP_PORT);
        assert_eq!(email.to, "alerts@example.test");
    }

    #[test]
    fn test_env_overrides_file() {
        let raw = r#"url = "https://file.example/board""#;
        let file: FileConfig = toml::from_str(raw).unwrap();

        let mut builder = Builder::default();
        builder.apply_file(file);
        builder
            .apply_env(|key| match key {
                "MSETRACK_URL" => Some("https://env.example/board".to_string()),
                "EMAIL_USER" => Some("user@example.test".to_string()),
                "EMAIL_PASS" => Some("hunter2".to_string()),
                "EMAIL_TO" => Some("ops@example.test".to_string()),
                "MSETRACK_SMTP_PORT" => Some("2525".to_string()),
                _ => None,
            })
            .unwrap();
        let config = builder.finish().unwrap();

        assert_eq!(config.url, "https://env.example/board");
        let email = config.email.unwrap();
        assert_eq!(email.smtp_port, 2525);
        assert_eq!(email.user, "user@example.test");
    }

    #[test]
    fn test_partial_email_credentials_disable_notifications() {
        let mut builder = Builder::default();
        builder
            .apply_env(|key| match key {
                "EMAIL_USER" => Some("user@example.test".to_string()),
                _ => None,
            })
            .unwrap();
        let config = builder.finish().unwrap();

        assert!(config.email.is_none());
    }

    #[test]
    fn test_invalid_run_time_is_an_error() {
        let mut builder = Builder::default();
        builder
            .apply_env(|key| match key {
                "MSETRACK_RUN_TIME" => Some("25:99".to_string()),
                _ => None,
            })
            .unwrap();

        let err = builder.finish().unwrap_err();
        assert!(err.to_string().contains("Invalid run time"));
    }

    #[test]
    fn test_invalid_smtp_port_is_an_error() {
        let mut builder = Builder::default();
        let err = builder
            .apply_env(|key| match key {
                "MSETRACK_SMTP_PORT" => Some("not-a-port".to_string()),
                _ => None,
            })
            .unwrap_err();

        assert!(err.to_string().contains("MSETRACK_SMTP_PORT"));
    }
}
