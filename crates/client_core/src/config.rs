use std::{collections::HashMap, fs};

use serde::Deserialize;
use shared::domain::{Address, Deployment};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub fullnode_url: String,
    pub signer_endpoint: String,
    pub package_id: String,
    pub module: String,
    pub account: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fullnode_url: "http://127.0.0.1:9000".into(),
            signer_endpoint: "http://127.0.0.1:9100/sign".into(),
            package_id: String::new(),
            module: "contract".into(),
            account: None,
        }
    }
}

impl Settings {
    pub fn deployment(&self) -> Deployment {
        Deployment::new(self.package_id.clone(), self.module.clone())
    }

    pub fn account(&self) -> Option<Address> {
        self.account.as_ref().map(Address::new)
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("poll_client.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("fullnode_url") {
                settings.fullnode_url = v.clone();
            }
            if let Some(v) = file_cfg.get("signer_endpoint") {
                settings.signer_endpoint = v.clone();
            }
            if let Some(v) = file_cfg.get("package_id") {
                settings.package_id = v.clone();
            }
            if let Some(v) = file_cfg.get("module") {
                settings.module = v.clone();
            }
            if let Some(v) = file_cfg.get("account") {
                settings.account = Some(v.clone());
            }
        }
    }

    if let Ok(v) = std::env::var("APP__FULLNODE_URL") {
        settings.fullnode_url = v;
    }
    if let Ok(v) = std::env::var("APP__SIGNER_ENDPOINT") {
        settings.signer_endpoint = v;
    }
    if let Ok(v) = std::env::var("APP__PACKAGE_ID") {
        settings.package_id = v;
    }
    if let Ok(v) = std::env::var("APP__MODULE") {
        settings.module = v;
    }
    if let Ok(v) = std::env::var("APP__ACCOUNT") {
        settings.account = Some(v);
    }

    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
