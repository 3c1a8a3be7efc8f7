//! Relay configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Where uploaded files are kept.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageBackend {
    /// Directory on disk
    Local { path: PathBuf },
    /// Process memory, lost on restart
    Memory,
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::Local {
            path: PathBuf::from("data/uploads"),
        }
    }
}

/// Transactional email settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Bearer token for the email API
    pub api_key: String,

    /// Base URL of the email API
    pub api_base: String,

    /// Sender address, shown as `{brand} <{sender}>`
    pub sender: String,

    /// Operator address receiving notifications
    pub recipient: String,

    /// Brand name used in subjects and email bodies
    pub brand: String,

    /// Public website linked from confirmation emails
    pub website_url: String,

    /// Footer line of confirmation emails
    pub tagline: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://api.resend.com".to_string(),
            sender: String::new(),
            recipient: String::new(),
            brand: "Nova Sei Press".to_string(),
            website_url: "https://novaseipress.com".to_string(),
            tagline: "Tennessee-based publishing services".to_string(),
        }
    }
}

/// Configuration for the relay server.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Origins allowed to call the relay from a browser
    pub allowed_origins: Vec<String>,

    /// Public origin used in download links; derived from the request when unset
    pub public_url: Option<String>,

    /// Upload size ceiling in bytes
    pub max_file_size: u64,

    /// Accepted upload extensions, lowercase
    pub allowed_extensions: Vec<String>,

    /// Lifetime of download links in days
    pub link_ttl_days: u32,

    /// Upload storage
    pub storage: StorageBackend,

    /// Email settings
    pub email: EmailConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            allowed_origins: Vec::new(),
            public_url: None,
            max_file_size: 10 * 1024 * 1024,
            allowed_extensions: vec!["pdf".to_string(), "docx".to_string(), "pages".to_string()],
            link_ttl_days: 30,
            storage: StorageBackend::default(),
            email: EmailConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Apply deployment overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("RESEND_API_KEY") {
            self.email.api_key = key;
        }
        if let Some(sender) = lookup("SENDER_EMAIL") {
            self.email.sender = sender;
        }
        if let Some(recipient) = lookup("RECIPIENT_EMAIL") {
            self.email.recipient = recipient;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.allowed_origins = parse_origins(&origins);
        }
        if let Some(url) = lookup("RELAY_PUBLIC_URL") {
            self.public_url = Some(url);
        }
        if let Some(port) = lookup("RELAY_PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!("Ignoring invalid RELAY_PORT: {}", port),
            }
        }
    }

    /// Human-readable upload ceiling, e.g. `10MB`.
    pub fn max_file_size_label(&self) -> String {
        let mb = self.max_file_size as f64 / 1024.0 / 1024.0;
        if mb.fract() == 0.0 {
            format!("{}MB", mb as u64)
        } else {
            format!("{:.1}MB", mb)
        }
    }

    /// Check that the settings the relay cannot run without are present.
    pub fn missing_email_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.email.api_key.is_empty() {
            missing.push("RESEND_API_KEY");
        }
        if self.email.sender.is_empty() {
            missing.push("SENDER_EMAIL");
        }
        if self.email.recipient.is_empty() {
            missing.push("RECIPIENT_EMAIL");
        }
        missing
    }
}

/// Split a comma separated origin list.
pub fn parse_origins(list: &str) -> Vec<String> {
    list.split(',')
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
