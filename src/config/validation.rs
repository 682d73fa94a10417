use crate::config::types::{Config, EngineConfig, ExtractConfig, SinkConfig, UserAgentConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_engine_config(&config.engine)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_extract_config(&config.extract, &config.engine)?;
    if let Some(sink) = &config.sink {
        validate_sink_config(sink)?;
    }
    Ok(())
}

/// Validates engine configuration
///
/// Public so engines built in code get the same checks as the CLI.
pub fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.step == 0 {
        return Err(ConfigError::Validation("step must be nonzero".to_string()));
    }

    if config.skip_max < 1 {
        return Err(ConfigError::Validation(format!(
            "skip_max must be >= 1, got {}",
            config.skip_max
        )));
    }

    if config.tiers < 1 {
        return Err(ConfigError::Validation(format!(
            "skip_max_retries must be >= 1, got {}",
            config.tiers
        )));
    }

    if config.check_every == 0 {
        return Err(ConfigError::Validation(
            "check_every must be > 0 seconds".to_string(),
        ));
    }

    if config.timeout == 0 {
        return Err(ConfigError::Validation(
            "timeout must be > 0 seconds".to_string(),
        ));
    }

    if let Some(end) = config.ending_id {
        let behind = if config.step > 0 {
            end < config.starting_id
        } else {
            end > config.starting_id
        };
        if behind {
            return Err(ConfigError::Validation(format!(
                "ending_id {} lies behind starting_id {} for step {:+}",
                end, config.starting_id, config.step
            )));
        }
    }

    for target in &config.targets {
        Url::parse(target).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid target URL '{}': {}", target, e))
        })?;
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
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

    // Validate contact URL
    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    // Validate contact email (basic validation)
    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates extraction configuration
fn validate_extract_config(
    config: &ExtractConfig,
    engine: &EngineConfig,
) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "extract name cannot be empty".to_string(),
        ));
    }

    // Cursor crawls need a way to turn an id into an address
    if engine.targets.is_empty() {
        match &config.url_template {
            Some(template) if template.contains("{id}") => {}
            Some(template) => {
                return Err(ConfigError::Validation(format!(
                    "url_template '{}' must contain the {{id}} placeholder",
                    template
                )))
            }
            None => {
                return Err(ConfigError::Validation(
                    "url_template is required when no explicit targets are configured"
                        .to_string(),
                ))
            }
        }
    }

    if config.fields.is_empty() {
        return Err(ConfigError::Validation(
            "at least one extract field must be configured".to_string(),
        ));
    }

    for (name, field) in &config.fields {
        validate_selector(&field.selector)
            .map_err(|e| ConfigError::InvalidSelector(format!("field '{}': {}", name, e)))?;
    }

    if let Some(skip_if) = &config.skip_if {
        validate_selector(skip_if)
            .map_err(|e| ConfigError::InvalidSelector(format!("skip_if: {}", e)))?;
    }

    for required in &config.required {
        if !config.fields.contains_key(required) {
            return Err(ConfigError::Validation(format!(
                "required field '{}' is not a configured field",
                required
            )));
        }
    }

    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), String> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| format!("'{}' is not a valid selector ({:?})", selector, e))
}

/// Validates sink configuration
fn validate_sink_config(config: &SinkConfig) -> Result<(), ConfigError> {
    if config.url.is_empty() {
        return Err(ConfigError::Validation("sink url cannot be empty".to_string()));
    }

    Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid sink url '{}': {}", config.url, e)))?;

    if config.subject.is_empty() || config.subject.contains(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "sink subject must be non-empty without whitespace, got '{}'",
            config.subject
        )));
    }

    if config.user.is_some() != config.password.is_some() {
        return Err(ConfigError::Validation(
            "sink user and password must be set together".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    // Domain part should contain at least one dot
    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
