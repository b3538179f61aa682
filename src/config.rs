use anyhow::Context;

#[derive(Debug, Clone)]
pub struct ResetConfig {
    pub ttl_minutes: i64,
    /// Demo shortcut: echo the generated code back in the forgot-password response.
    pub code_in_response: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub database_name: Option<String>,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub reset: ResetConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            database_name: None,
            max_connections: 10,
            host: "0.0.0.0".into(),
            port: 8080,
            reset: ResetConfig {
                ttl_minutes: 15,
                code_in_response: true,
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("APP_PORT").or_else(|| var("PORT")) {
            Some(v) => v.parse::<u16>().with_context(|| format!("invalid port {v:?}"))?,
            None => defaults.port,
        };
        let max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .parse::<u32>()
                .with_context(|| format!("invalid DATABASE_MAX_CONNECTIONS {v:?}"))?,
            None => defaults.max_connections,
        };
        let ttl_minutes = match var("RESET_CODE_TTL_MINUTES") {
            Some(v) => v
                .parse::<i64>()
                .ok()
                .filter(|m| *m > 0)
                .with_context(|| format!("invalid RESET_CODE_TTL_MINUTES {v:?}"))?,
            None => defaults.reset.ttl_minutes,
        };
        let code_in_response = match var("RESET_CODE_IN_RESPONSE") {
            Some(v) => parse_bool(&v)
                .with_context(|| format!("invalid RESET_CODE_IN_RESPONSE {v:?}"))?,
            None => defaults.reset.code_in_response,
        };

        Ok(Self {
            database_url: var("DATABASE_URL"),
            database_name: var("DATABASE_NAME"),
            max_connections,
            host: var("APP_HOST").unwrap_or(defaults.host),
            port,
            reset: ResetConfig {
                ttl_minutes,
                code_in_response,
            },
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
