use crate::config::types::{
    Config, DelayConfig, IdentityProfile, OutputConfig, SchedulerConfig, SelectorConfig,
    SiteConfig,
};
use crate::crawler::compile_selector;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_scheduler_config(&config.scheduler)?;
    validate_delay_config(&config.delays)?;
    validate_output_config(&config.output)?;
    validate_selectors(&config.selectors)?;
    validate_identities(&config.identities)?;
    Ok(())
}

/// Validates the target site layout
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if !config.catalog_path.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "catalog-path must contain a {{page}} placeholder, got '{}'",
            config.catalog_path
        )));
    }

    if config.default_category.trim().is_empty() {
        return Err(ConfigError::Validation(
            "default-category cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates scheduler limits
fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if !(config.requests_per_second > 0.0 && config.requests_per_second <= 100.0) {
        return Err(ConfigError::Validation(format!(
            "requests-per-second must be in (0, 100], got {}",
            config.requests_per_second
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.queue_capacity < 1 {
        return Err(ConfigError::Validation(
            "queue-capacity must be >= 1".to_string(),
        ));
    }

    if config.respect_robots && config.robots_user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "robots-user-agent cannot be empty when respect-robots is set".to_string(),
        ));
    }

    Ok(())
}

fn validate_delay_config(config: &DelayConfig) -> Result<(), ConfigError> {
    if config.min_item_delay_ms > config.max_item_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min-item-delay-ms ({}) exceeds max-item-delay-ms ({})",
            config.min_item_delay_ms, config.max_item_delay_ms
        )));
    }
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("data-dir", &config.data_dir),
        ("log-dir", &config.log_dir),
        ("ledger-path", &config.ledger_path),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }
    Ok(())
}

/// Every selector must compile before a crawl starts
fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    for selector in [
        &config.novel_item,
        &config.novel_link,
        &config.novel_stats,
        &config.novel_status,
        &config.pagination_link,
        &config.novel_id,
        &config.title,
        &config.author,
        &config.cover,
        &config.summary,
        &config.categories,
        &config.tags,
        &config.detail_status,
        &config.chapter_title,
        &config.chapter_content,
        &config.chapter_noise,
    ] {
        compile_selector(selector)?;
    }
    Ok(())
}

fn validate_identities(identities: &[IdentityProfile]) -> Result<(), ConfigError> {
    for identity in identities {
        if identity.user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "identity user-agent cannot be empty".to_string(),
            ));
        }
        if reqwest::header::HeaderValue::from_str(&identity.user_agent).is_err() {
            return Err(ConfigError::Validation(format!(
                "identity user-agent is not a valid header value: '{}'",
                identity.user_agent
            )));
        }
    }
    Ok(())
}
