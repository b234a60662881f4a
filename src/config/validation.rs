use crate::config::types::{Config, CrawlerConfig, OutputConfig, ScopeConfig, UserAgentConfig};
use crate::url::{normalize, AllowedHosts};
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Validates the entire configuration
///
/// Every check here runs before the worker pool starts; a failure is the only
/// kind of error that stops a crawl.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_scope(&config.scope)?;
    Ok(())
}

/// Validates worker pool settings
fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    if config.worker_count < 1 || config.worker_count > 100 {
        return Err(ConfigError::Validation(format!(
            "worker_count must be between 1 and 100, got {}",
            config.worker_count
        )));
    }

    if config.fetch_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "fetch_timeout_ms must be greater than 0".to_string(),
        ));
    }

    if config.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "poll_interval_ms must be greater than 0".to_string(),
        ));
    }

    for ext in &config.attachment_extensions {
        let ext = ext.trim_start_matches('.');
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(format!(
                "attachment extension '{}' must be alphanumeric",
                ext
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> ConfigResult<()> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact) = &config.contact_url {
        Url::parse(contact)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if config.checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint_path cannot be empty".to_string(),
        ));
    }

    if config.entries_path.is_empty() {
        return Err(ConfigError::Validation(
            "entries_path cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_path == config.entries_path {
        return Err(ConfigError::Validation(
            "checkpoint_path and entries_path must differ".to_string(),
        ));
    }

    Ok(())
}

/// Validates allowed hosts and seeds
///
/// A seed that the normalizer would reject could never be crawled, so it is
/// reported here instead of being silently dropped at seeding time.
fn validate_scope(scope: &ScopeConfig) -> ConfigResult<()> {
    if scope.allowed_hosts.is_empty() {
        return Err(ConfigError::Validation(
            "allowed_hosts must list at least one host".to_string(),
        ));
    }

    for host in &scope.allowed_hosts {
        validate_host(host)?;
    }

    if scope.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "seeds must list at least one URL".to_string(),
        ));
    }

    let allowed = AllowedHosts::new(&scope.allowed_hosts);
    for seed in &scope.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if normalize(seed, &url, &allowed).is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' is not an http(s) URL on an allowed host",
                seed
            )));
        }
    }

    Ok(())
}

/// Validates a bare host name (no scheme, no wildcard)
fn validate_host(host: &str) -> ConfigResult<()> {
    let host = host.trim();

    if host.is_empty() {
        return Err(ConfigError::InvalidHost("Host cannot be empty".to_string()));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidHost(format!(
            "Host '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(ConfigError::InvalidHost(format!(
            "Host '{}' cannot start or end with '.' or '-'",
            host
        )));
    }

    if host.contains("..") {
        return Err(ConfigError::InvalidHost(format!(
            "Host '{}' cannot contain consecutive dots",
            host
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_host() {
        assert!(validate_host("example.org").is_ok());
        assert!(validate_host("oisp.hcmut.edu.vn").is_ok());
        assert!(validate_host("localhost").is_ok());
        assert!(validate_host("127.0.0.1").is_ok());

        assert!(validate_host("").is_err());
        assert!(validate_host("*.example.org").is_err());
        assert!(validate_host("https://example.org").is_err());
        assert!(validate_host(".example.org").is_err());
        assert!(validate_host("example..org").is_err());
    }

    fn scope(seeds: &[&str], hosts: &[&str]) -> ScopeConfig {
        ScopeConfig {
            seeds: seeds.iter().map(|s| s.to_string()).collect(),
            allowed_hosts: hosts.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_validate_scope() {
        assert!(validate_scope(&scope(&["https://example.org/"], &["example.org"])).is_ok());

        // No hosts
        assert!(validate_scope(&scope(&["https://example.org/"], &[])).is_err());
        // No seeds
        assert!(validate_scope(&scope(&[], &["example.org"])).is_err());
        // Seed outside the allow-list
        assert!(matches!(
            validate_scope(&scope(&["https://other.org/"], &["example.org"])),
            Err(ConfigError::InvalidUrl(_))
        ));
        // Subdomain is not implied
        assert!(validate_scope(&scope(&["https://www.example.org/"], &["example.org"])).is_err());
    }

    #[test]
    fn test_validate_crawler_config() {
        let mut config = CrawlerConfig {
            worker_count: 3,
            fetch_timeout_ms: 1000,
            poll_interval_ms: 100,
            attachment_extensions: vec!["pdf".to_string(), ".docx".to_string()],
        };
        assert!(validate_crawler_config(&config).is_ok());

        config.worker_count = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.worker_count = 3;
        config.poll_interval_ms = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.poll_interval_ms = 100;
        config.attachment_extensions.push("tar.gz".to_string());
        assert!(validate_crawler_config(&config).is_err());
    }
}
