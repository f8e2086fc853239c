use serde::Deserialize;

/// Configuration profile selected by the `APP_ENV` environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Profile {
    /// Development defaults: permissive origins, small pool.
    Default,
    /// Production: explicit origins only, larger pool.
    Production,
}

impl Profile {
    fn from_env_value(value: &str) -> Self {
        match value {
            "production" => Profile::Production,
            _ => Profile::Default,
        }
    }

    /// Connection pool size for this profile.
    pub fn max_connections(self) -> u32 {
        match self {
            Profile::Default => 5,
            Profile::Production => 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub profile: Profile,
    pub database_url: String,
    pub port: u16,
    /// Remote CSV source for the sync service, if configured.
    pub source_url: Option<String>,
    /// Local CSV file source for the sync service, if configured.
    pub source_file: Option<String>,
    /// CORS origin allowlist.
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let profile = Profile::from_env_value(
            &std::env::var("APP_ENV").unwrap_or_else(|_| "default".to_string()),
        );

        let config = Self {
            profile,
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            source_url: std::env::var("SOURCE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("SOURCE_URL must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?,
            source_file: std::env::var("SOURCE_FILE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| {
                    vec![
                        "http://localhost:3000".to_string(),
                        "http://127.0.0.1:3000".to_string(),
                    ]
                }),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Profile: {:?}", config.profile);
        if let Some(ref source) = config.source_url {
            tracing::info!("Sync source URL configured: {}", source);
        }
        if let Some(ref file) = config.source_file {
            tracing::info!("Sync source file configured: {}", file);
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
