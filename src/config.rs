use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Settings for the `authToken` session cookie.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
    pub ai: AiConfig,
    pub client_url: Option<String>,
    pub ingestion_key: Option<String>,
    pub seed_sample_data: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "fitfusion".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "fitfusion-users".into()),
            ttl_minutes: parse_var("JWT_TTL_MINUTES").unwrap_or(60 * 24 * 7),
            refresh_ttl_minutes: parse_var("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };
        let production = std::env::var("APP_ENV")
            .map(|v| v == "production")
            .unwrap_or(false);
        let cookie = CookieConfig {
            secure: parse_var("COOKIE_SECURE").unwrap_or(production),
        };
        let ai = AiConfig {
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into()),
            timeout_secs: parse_var("GEMINI_TIMEOUT_SECS").unwrap_or(60),
        };
        Ok(Self {
            database_url,
            max_connections: parse_var("DB_MAX_CONNECTIONS").unwrap_or(10),
            jwt,
            cookie,
            ai,
            client_url: non_empty_var("CLIENT_URL"),
            ingestion_key: non_empty_var("INGESTION_KEY"),
            seed_sample_data: parse_var("SEED_SAMPLE_DATA").unwrap_or(false),
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
