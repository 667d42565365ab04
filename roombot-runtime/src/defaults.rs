use roombot_core::config::ClientConfig;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const API_URL_ENV: &str = "ROOMBOT_API_URL";

pub fn default_client_config() -> ClientConfig {
    ClientConfig::with_base_url(DEFAULT_API_BASE_URL)
}

/// Applies `ROOMBOT_API_URL` on top of a loaded config.
pub fn apply_env_overrides(cfg: ClientConfig) -> ClientConfig {
    apply_api_url_override(cfg, std::env::var(API_URL_ENV).ok())
}

fn apply_api_url_override(mut cfg: ClientConfig, api_url: Option<String>) -> ClientConfig {
    if let Some(url) = api_url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
        cfg.api_base_url = url;
    }
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_replaces_base_url_only() {
        let cfg = apply_api_url_override(
            default_client_config(),
            Some(" https://rooms.example.com ".into()),
        );
        assert_eq!(cfg.api_base_url, "https://rooms.example.com");
        assert_eq!(cfg.silence_timeout_ms, 2000);
    }

    #[test]
    fn blank_override_is_ignored() {
        let cfg = apply_api_url_override(default_client_config(), Some("  ".into()));
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
    }
}
