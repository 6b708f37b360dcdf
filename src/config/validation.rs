use crate::config::types::Config;
use crate::features::Feature;
use crate::ConfigError;
use url::Url;

/// Validates a parsed configuration
///
/// Everything that would otherwise fail mid-run is rejected here: an
/// unknown feature name, an empty identity list, a query template without
/// a `{date}` placeholder.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.search.from_year > config.search.to_year {
        return Err(ConfigError::Validation(format!(
            "from-year ({}) must not be after to-year ({})",
            config.search.from_year, config.search.to_year
        )));
    }

    if !config.search.query.contains("{date}") {
        return Err(ConfigError::Validation(
            "search query must contain a {date} placeholder".to_string(),
        ));
    }

    if config.search.target_count == 0 {
        return Err(ConfigError::Validation(
            "target-count must be positive".to_string(),
        ));
    }

    if config.search.sample_size == 0 {
        return Err(ConfigError::Validation(
            "sample-size must be positive".to_string(),
        ));
    }

    if config.checkpoint.flush_interval == 0 {
        return Err(ConfigError::Validation(
            "flush-interval must be positive".to_string(),
        ));
    }

    for (name, path) in [
        ("unmaintained-ids", &config.checkpoint.unmaintained_ids),
        ("maintained-ids", &config.checkpoint.maintained_ids),
        ("not-suitable-ids", &config.checkpoint.not_suitable_ids),
        ("seen-names", &config.checkpoint.seen_names),
        ("run-log", &config.checkpoint.run_log),
        ("maintained-csv", &config.compute.maintained_csv),
        ("unmaintained-csv", &config.compute.unmaintained_csv),
    ] {
        if path.is_empty() {
            return Err(ConfigError::Validation(format!("{} must not be empty", name)));
        }
    }

    if config.compute.features.is_empty() {
        return Err(ConfigError::Validation(
            "at least one feature must be configured".to_string(),
        ));
    }

    // Resolve every configured feature name now; an unknown name is a
    // startup-time configuration error, not a runtime surprise.
    Feature::resolve(&config.compute.features)?;

    if Url::parse(&config.provider.api_base).is_err() {
        return Err(ConfigError::Validation(format!(
            "api-base is not a valid URL: {}",
            config.provider.api_base
        )));
    }

    if config.provider.tokens.is_empty() {
        return Err(ConfigError::Validation(
            "at least one API token must be configured".to_string(),
        ));
    }

    if config.provider.acquire_attempts == 0 {
        return Err(ConfigError::Validation(
            "acquire-attempts must be positive".to_string(),
        ));
    }

    if config.provider.max_wait_minutes == 0 {
        return Err(ConfigError::Validation(
            "max-wait-minutes must be positive".to_string(),
        ));
    }

    if config.blob.enabled {
        if config.blob.region.is_empty() {
            return Err(ConfigError::Validation(
                "blob region must be set when the blob store is enabled".to_string(),
            ));
        }
        if config.blob.bucket.is_empty() {
            return Err(ConfigError::Validation(
                "blob bucket must be set when the blob store is enabled".to_string(),
            ));
        }
    }

    Ok(())
}
