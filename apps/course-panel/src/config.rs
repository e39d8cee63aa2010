use std::fs;
use std::net::IpAddr;
use std::path::Path;

use anyhow::{Context, Result};
use course_db::StoreBackend;
use serde::{Deserialize, Serialize};

const CONFIG_ENV: &str = "COURSE_PANEL_CONFIG";
const CONFIG_PATHS: [&str; 2] = ["/etc/course-panel/panel.toml", "./panel.toml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Host printed on coupons and embedded in registration links.
    #[serde(default = "default_public_host")]
    pub public_host: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default)]
    pub store: StoreBackend,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub links: CourseLinks,
    /// Reverse proxies whose `X-Forwarded-For` header names the client.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    #[serde(default = "default_stripe_api")]
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    pub access_token: Option<String>,
    #[serde(default = "default_crm_url")]
    pub leads_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Delivery endpoint. Without it mail is logged instead of sent.
    pub api_url: Option<String>,
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseLinks {
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub telegram: String,
    #[serde(default)]
    pub certificate: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_public_host() -> String {
    "aisurvey.obaisukar.com".to_string()
}

fn default_log_dir() -> String {
    ".".to_string()
}

fn default_stripe_api() -> String {
    "https://api.stripe.com".to_string()
}

fn default_crm_url() -> String {
    "https://www.zohoapis.com/crm/v2/Leads".to_string()
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            api_base: default_stripe_api(),
        }
    }
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            leads_url: default_crm_url(),
        }
    }
}

impl PanelConfig {
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }

        for path in CONFIG_PATHS {
            let path = Path::new(path);
            if path.exists() {
                return Self::load_from(path);
            }
        }

        tracing::info!("Loading config from environment");
        Ok(Self::from_env())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::info!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let store = match var("STORE_BACKEND").as_deref() {
            Some("memory") => StoreBackend::Memory,
            Some("postgres") => StoreBackend::Postgres {
                url: var("DATABASE_URL").unwrap_or_default(),
                max_connections: var("DATABASE_MAX_CONNECTIONS").and_then(|v| v.parse().ok()),
            },
            Some("redis") => StoreBackend::Redis {
                url: var("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
                namespace: var("REDIS_NAMESPACE"),
            },
            _ => match var("STORE_PATH") {
                Some(path) => StoreBackend::File { path },
                None => StoreBackend::default(),
            },
        };

        Self {
            listen_addr: var("LISTEN_ADDR").unwrap_or_else(default_listen_addr),
            public_host: var("PUBLIC_HOST").unwrap_or_else(default_public_host),
            log_dir: var("LOG_DIR").unwrap_or_else(default_log_dir),
            store,
            stripe: StripeConfig {
                secret_key: var("STRIPE_SECRET_KEY"),
                api_base: var("STRIPE_API_BASE").unwrap_or_else(default_stripe_api),
            },
            crm: CrmConfig {
                access_token: var("ZOHO_ACCESS_TOKEN"),
                leads_url: var("ZOHO_LEADS_URL").unwrap_or_else(default_crm_url),
            },
            email: EmailConfig {
                api_url: var("EMAIL_API_URL"),
                api_token: var("EMAIL_API_TOKEN"),
            },
            links: CourseLinks {
                course: var("COURSE_LINK").unwrap_or_default(),
                platform: var("PLATFORM_LINK").unwrap_or_default(),
                telegram: var("TELEGRAM_LINK").unwrap_or_default(),
                certificate: var("CERTIFICATE_LINK").unwrap_or_default(),
            },
            trusted_proxies: var("TRUSTED_PROXIES").map(|v| parse_proxies(&v)).unwrap_or_default(),
        }
    }
}

/// Comma-separated IPs. Entries that do not parse are skipped.
fn parse_proxies(raw: &str) -> Vec<IpAddr> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                tracing::warn!("Ignoring invalid trusted proxy address {:?}", s);
                None
            }
        })
        .collect()
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            public_host: default_public_host(),
            log_dir: default_log_dir(),
            store: StoreBackend::default(),
            stripe: StripeConfig::default(),
            crm: CrmConfig::default(),
            email: EmailConfig::default(),
            links: CourseLinks::default(),
            trusted_proxies: Vec::new(),
        }
    }
}
