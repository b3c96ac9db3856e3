use std::env;

/// One year; longer lifetimes are a configuration mistake.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

/// Account created at startup when no user with `email` exists yet.
#[derive(Clone, Debug)]
pub struct AdminBootstrap {
    pub name: String,
    pub email: String,
    pub document: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres when set, in-memory store otherwise.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub seed_demo_data: bool,
    pub admin: Option<AdminBootstrap>,
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = get("DATABASE_URL").filter(|s| !s.trim().is_empty());
        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());

        let session_ttl_hours = match get("SESSION_TTL_HOURS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|h| (1..=MAX_SESSION_TTL_HOURS).contains(h))
                .ok_or_else(|| {
                    anyhow::anyhow!("SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}")
                })?,
            None => 24,
        };

        // Demo data only makes sense for the throwaway in-memory store by default.
        let seed_demo_data = match get("SEED_DEMO_DATA") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| anyhow::anyhow!("SEED_DEMO_DATA must be true or false"))?,
            None => database_url.is_none(),
        };

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                name: get("ADMIN_NAME").unwrap_or_else(|| "Admin Sistema".to_string()),
                email,
                document: get("ADMIN_DOCUMENTO").unwrap_or_else(|| "00000000".to_string()),
                password,
            }),
            (Some(_), None) | (None, Some(_)) => {
                anyhow::bail!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together")
            }
            (None, None) => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            seed_demo_data,
            admin,
        })
    }
}
