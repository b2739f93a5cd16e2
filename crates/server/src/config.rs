use std::{fs, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub bus_url: Option<String>,
    pub secret: String,
    pub verify_authorized: bool,
    pub bus_timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:31338".into(),
            bus_url: None,
            secret: "devsecret".into(),
            verify_authorized: true,
            bus_timeout_seconds: 10,
        }
    }
}

impl Settings {
    pub fn bus_url(&self) -> anyhow::Result<Option<Url>> {
        let Some(raw) = self.bus_url.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }
        let url = Url::parse(raw).with_context(|| format!("invalid bus url '{raw}'"))?;
        Ok(Some(url))
    }

    pub fn bus_timeout(&self) -> Duration {
        Duration::from_secs(self.bus_timeout_seconds)
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<toml::Table>(raw) else {
        return;
    };

    if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
        settings.server_bind = v.to_string();
    }
    if let Some(v) = file_cfg.get("bus_url").and_then(toml::Value::as_str) {
        settings.bus_url = Some(v.to_string());
    }
    if let Some(v) = file_cfg.get("secret").and_then(toml::Value::as_str) {
        settings.secret = v.to_string();
    }
    if let Some(v) = file_cfg.get("verify_authorized").and_then(toml::Value::as_bool) {
        settings.verify_authorized = v;
    }
    if let Some(v) = file_cfg
        .get("bus_timeout_seconds")
        .and_then(toml::Value::as_integer)
        .and_then(|v| u64::try_from(v).ok())
    {
        settings.bus_timeout_seconds = v;
    }
}

fn apply_env(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("LOGUX_BUS_URL") {
        settings.bus_url = Some(v);
    }
    if let Some(v) = env("APP__BUS_URL") {
        settings.bus_url = Some(v);
    }

    if let Some(v) = env("LOGUX_SECRET") {
        settings.secret = v;
    }
    if let Some(v) = env("APP__SECRET") {
        settings.secret = v;
    }

    if let Some(v) = env("APP__VERIFY_AUTHORIZED") {
        if let Ok(parsed) = v.trim().parse::<bool>() {
            settings.verify_authorized = parsed;
        }
    }

    if let Some(v) = env("APP__BUS_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.bus_timeout_seconds = parsed;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
