//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
///
/// A missing API key is deliberately not an error here: the server still
/// starts and each chat turn reports the credential problem on its own.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.assistant.name.trim().is_empty() {
        errors.push("assistant.name must not be empty".to_string());
    }
    if config.assistant.persona.trim().is_empty() {
        errors.push("assistant.persona must not be empty".to_string());
    }
    if config.assistant.model.trim().is_empty() {
        errors.push("assistant.model must not be empty".to_string());
    }
    if config.assistant.max_tokens == 0 {
        errors.push("assistant.max_tokens must be > 0".to_string());
    }
    if !(0.0..=2.0).contains(&config.assistant.temperature) {
        errors.push("assistant.temperature must be in [0.0, 2.0]".to_string());
    }

    if config.provider.timeout_secs == 0 {
        errors.push("provider.timeout_secs must be > 0".to_string());
    }
    if let Some(base) = &config.provider.api_base {
        let base = base.trim();
        if !base.is_empty() && !base.starts_with("http://") && !base.starts_with("https://") {
            errors.push("provider.api_base must start with http:// or https://".to_string());
        }
    }

    if config.gateway.host.trim().is_empty() {
        errors.push("gateway.host must not be empty".to_string());
    }

    let format = config.logging.format.to_lowercase();
    if format != "text" && format != "json" {
        errors.push("logging.format must be either text or json".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
