use crate::constants;
use crate::error::{Result, ScraperError};
use crate::fetch::RetryPolicy;
use crate::types::Source;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestSettings,
    #[serde(default = "constants::default_sources")]
    pub sources: Vec<Source>,
}

/// Run-wide knobs of the crawl
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    pub max_in_flight: usize,
    pub fetch_retries: u32,
    pub retry_backoff_ms: u64,
    pub request_timeout_secs: u64,
    pub deadline_secs: Option<u64>,
    pub user_agent: String,
    pub requests_per_min: Option<u64>,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            max_in_flight: constants::DEFAULT_MAX_IN_FLIGHT,
            fetch_retries: constants::DEFAULT_FETCH_RETRIES,
            retry_backoff_ms: constants::DEFAULT_RETRY_BACKOFF_MS,
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT_SECS,
            deadline_secs: Some(constants::DEFAULT_DEADLINE_SECS),
            user_agent: constants::USER_AGENT.to_string(),
            requests_per_min: None,
        }
    }
}

impl HarvestSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.fetch_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Config {
    /// Built-in venue catalog with default settings.
    pub fn builtin() -> Self {
        Self {
            harvest: HarvestSettings::default(),
            sources: constants::default_sources(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.harvest.max_in_flight == 0 {
            return Err(ScraperError::Config("max_in_flight must be at least 1".into()));
        }
        let mut names = std::collections::HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                return Err(ScraperError::Config(format!(
                    "source '{}' is configured twice",
                    source.name
                )));
            }
        }
        Ok(())
    }

    /// Keeps only the named sources, in configuration order.
    pub fn select<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self> {
        if names.is_empty() {
            return Ok(self);
        }
        if let Some(unknown) = names
            .iter()
            .map(AsRef::as_ref)
            .find(|name| !self.sources.iter().any(|s| s.name == *name))
        {
            return Err(ScraperError::Config(format!("unknown source '{unknown}'")));
        }
        self.sources
            .retain(|s| names.iter().any(|name| name.as_ref() == s.name));
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Family;

    #[test]
    fn test_empty_file_means_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.harvest, HarvestSettings::default());
        assert_eq!(config.sources, constants::default_sources());
    }

    #[test]
    fn test_partial_settings_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [harvest]
            max_in_flight = 4
            requests_per_min = 120

            [[sources]]
            name = "Brooklyn Bowl"
            family = "ticket_fly_api"
            seed_urls = ["http://www.ticketfly.com/api/events/list"]
            venue_id = 1
            org_id = 3
            exclude_artist_pattern = ".*family bowl.*"
            "#,
        )
        .unwrap();
        assert_eq!(config.harvest.max_in_flight, 4);
        assert_eq!(config.harvest.requests_per_min, Some(120));
        assert_eq!(config.harvest.fetch_retries, constants::DEFAULT_FETCH_RETRIES);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(
            config.sources[0].family,
            Family::TicketFlyApi {
                venue_id: 1,
                org_id: Some(3),
                exclude_artist_pattern: Some(".*family bowl.*".into()),
            }
        );
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let zero = Config::from_toml_str("[harvest]\nmax_in_flight = 0\n");
        assert!(matches!(zero, Err(ScraperError::Config(_))));

        let unknown_family = Config::from_toml_str(
            r#"
            [[sources]]
            name = "Somewhere"
            family = "carrier_pigeon"
            seed_urls = ["http://example.com"]
            "#,
        );
        assert!(matches!(unknown_family, Err(ScraperError::Toml(_))));
    }

    #[test]
    fn test_select_narrows_in_catalog_order() {
        let config = Config::builtin()
            .select(&["Warsaw", "Bowery Ballroom"])
            .unwrap();
        let names: Vec<_> = config.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Bowery Ballroom", "Warsaw"]);

        let err = Config::builtin().select(&["Nowhere"]).unwrap_err();
        assert!(err.to_string().contains("Nowhere"));

        let all = Config::builtin().select::<&str>(&[]).unwrap();
        assert_eq!(all.sources.len(), constants::default_sources().len());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ScraperError::Config(_)));
    }
}
