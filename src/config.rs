use serde::Deserialize;
use std::path::PathBuf;

/// Credentials and endpoint for one third-party provider.
///
/// A provider without an API key runs in mock mode: it answers with a
/// synthetic payload that the resolver excludes.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl ProviderConfig {
    fn new(base_url: &str) -> Self {
        Self {
            api_key: None,
            base_url: base_url.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub apollo: ProviderConfig,
    pub pdl: ProviderConfig,
    pub hunter: ProviderConfig,
    pub zoominfo: ProviderConfig,
    pub gnews: ProviderConfig,
    /// Keyless news feed searched when GNews is unavailable.
    pub google_news_rss: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Option<String>,
    pub port: u16,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub personalization_model: String,
    pub premium_model: String,
    pub review_model: String,
    pub providers: ProvidersConfig,
    pub provider_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    pub llm_max_retries: u32,
    pub llm_retry_delay_ms: u64,
    pub guardrail_max_retries: u32,
    pub news_cache_max_age_hours: i64,
    pub batch_concurrency: usize,
    pub vip_domains: Vec<String>,
    pub content_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            port: 3000,
            anthropic_api_key: None,
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            personalization_model: "claude-3-5-haiku-20241022".to_string(),
            premium_model: "claude-opus-4-5-20251101".to_string(),
            review_model: "claude-sonnet-4-20250514".to_string(),
            providers: ProvidersConfig {
                apollo: ProviderConfig::new("https://api.apollo.io"),
                pdl: ProviderConfig::new("https://api.peopledatalabs.com"),
                hunter: ProviderConfig::new("https://api.hunter.io"),
                zoominfo: ProviderConfig::new("https://api.zoominfo.com"),
                gnews: ProviderConfig::new("https://gnews.io"),
                google_news_rss: ProviderConfig::new("https://news.google.com"),
            },
            provider_timeout_secs: 10,
            llm_timeout_secs: 30,
            llm_max_retries: 3,
            llm_retry_delay_ms: 1000,
            guardrail_max_retries: 2,
            news_cache_max_age_hours: 24,
            batch_concurrency: 5,
            vip_domains: ["google.com", "microsoft.com", "apple.com", "amazon.com"]
                .iter()
                .map(|d| d.to_string())
                .collect(),
            content_dir: None,
        }
    }
}

/// Reads an optional secret, treating blank values as unset.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn http_url_var(name: &str, default: &str) -> anyhow::Result<String> {
    let raw = optional_var(name).unwrap_or_else(|| default.to_string());
    let parsed = url::Url::parse(&raw)
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn number_var<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match optional_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", name)),
        None => Ok(default),
    }
}

fn provider_var(
    key_var: &str,
    url_var: &str,
    defaults: &ProviderConfig,
) -> anyhow::Result<ProviderConfig> {
    Ok(ProviderConfig {
        api_key: optional_var(key_var),
        base_url: http_url_var(url_var, &defaults.base_url)?,
    })
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            database_url: optional_var("DB_URL")
                .or_else(|| optional_var("DATABASE_URL"))
                .map(|url| {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })
                .transpose()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            anthropic_api_key: optional_var("ANTHROPIC_API_KEY"),
            anthropic_base_url: http_url_var("ANTHROPIC_BASE_URL", &defaults.anthropic_base_url)?,
            personalization_model: optional_var("PERSONALIZATION_MODEL")
                .unwrap_or(defaults.personalization_model),
            premium_model: optional_var("PREMIUM_MODEL").unwrap_or(defaults.premium_model),
            review_model: optional_var("REVIEW_MODEL").unwrap_or(defaults.review_model),
            providers: ProvidersConfig {
                apollo: provider_var(
                    "APOLLO_API_KEY",
                    "APOLLO_BASE_URL",
                    &defaults.providers.apollo,
                )?,
                pdl: provider_var("PDL_API_KEY", "PDL_BASE_URL", &defaults.providers.pdl)?,
                hunter: provider_var(
                    "HUNTER_API_KEY",
                    "HUNTER_BASE_URL",
                    &defaults.providers.hunter,
                )?,
                zoominfo: provider_var(
                    "ZOOMINFO_API_KEY",
                    "ZOOMINFO_BASE_URL",
                    &defaults.providers.zoominfo,
                )?,
                gnews: provider_var("GNEWS_API_KEY", "GNEWS_BASE_URL", &defaults.providers.gnews)?,
                google_news_rss: ProviderConfig {
                    api_key: None,
                    base_url: http_url_var(
                        "GOOGLE_NEWS_RSS_URL",
                        &defaults.providers.google_news_rss.base_url,
                    )?,
                },
            },
            provider_timeout_secs: number_var("PROVIDER_TIMEOUT_SECS", defaults.provider_timeout_secs)?,
            llm_timeout_secs: number_var("LLM_TIMEOUT_SECS", defaults.llm_timeout_secs)?,
            llm_max_retries: number_var("LLM_MAX_RETRIES", defaults.llm_max_retries)
                .and_then(|n: u32| {
                    if n == 0 {
                        anyhow::bail!("LLM_MAX_RETRIES must be at least 1");
                    }
                    Ok(n)
                })?,
            llm_retry_delay_ms: number_var("LLM_RETRY_DELAY_MS", defaults.llm_retry_delay_ms)?,
            guardrail_max_retries: number_var(
                "GUARDRAIL_MAX_RETRIES",
                defaults.guardrail_max_retries,
            )?,
            news_cache_max_age_hours: number_var(
                "NEWS_CACHE_MAX_AGE_HOURS",
                defaults.news_cache_max_age_hours,
            )
            .and_then(|h: i64| {
                if h <= 0 {
                    anyhow::bail!("NEWS_CACHE_MAX_AGE_HOURS must be positive");
                }
                Ok(h)
            })?,
            batch_concurrency: number_var("BATCH_CONCURRENCY", defaults.batch_concurrency)
                .and_then(|n: usize| {
                    if n == 0 {
                        anyhow::bail!("BATCH_CONCURRENCY must be at least 1");
                    }
                    Ok(n)
                })?,
            vip_domains: optional_var("VIP_DOMAINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|d| d.trim().to_lowercase())
                        .filter(|d| !d.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.vip_domains),
            content_dir: optional_var("CONTENT_DIR").map(PathBuf::from),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        if let Some(ref url) = config.database_url {
            tracing::debug!("Database URL: {}...", &url[..20.min(url.len())]);
        } else {
            tracing::warn!("⚠ No DATABASE_URL set, using in-memory profile store");
        }
        if config.anthropic_api_key.is_none() {
            tracing::warn!("⚠ ANTHROPIC_API_KEY not set, generators run in mock mode");
        }
        for (name, provider) in [
            ("apollo", &config.providers.apollo),
            ("pdl", &config.providers.pdl),
            ("hunter", &config.providers.hunter),
            ("zoominfo", &config.providers.zoominfo),
            ("gnews", &config.providers.gnews),
            ("google_news_rss", &config.providers.google_news_rss),
        ] {
            tracing::debug!(
                "Provider {}: {} (configured: {})",
                name,
                provider.base_url,
                provider.is_configured()
            );
        }
        tracing::debug!("News cache max age: {}h", config.news_cache_max_age_hours);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.news_cache_max_age_hours, 24);
        assert_eq!(config.batch_concurrency, 5);
        assert_eq!(config.guardrail_max_retries, 2);
        assert_eq!(config.llm_max_retries, 3);
        assert!(config.vip_domains.contains(&"google.com".to_string()));
        assert!(!config.providers.apollo.is_configured());
        assert_eq!(config.providers.google_news_rss.base_url, "https://news.google.com");
    }

    #[test]
    fn test_url_validation_rejects_other_schemes() {
        std::env::set_var("RAD_TEST_BAD_URL", "ftp://example.com");
        assert!(http_url_var("RAD_TEST_BAD_URL", "https://x.io").is_err());
        std::env::set_var("RAD_TEST_GOOD_URL", "http://localhost:9000/");
        assert_eq!(
            http_url_var("RAD_TEST_GOOD_URL", "https://x.io").unwrap(),
            "http://localhost:9000"
        );
    }
}
