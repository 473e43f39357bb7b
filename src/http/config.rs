use std::time::Duration;

/// Every outbound request of the crate is bounded by this timeout unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub(crate) timeout: Duration,
    pub(crate) conn_timeout: Duration,
    pub(crate) follow_redirects: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            conn_timeout: DEFAULT_TIMEOUT,
            follow_redirects: false,
        }
    }
}

impl HttpConfig {
    pub fn new(timeout: Duration, conn_timeout: Duration) -> Self {
        Self {
            timeout,
            conn_timeout,
            ..Default::default()
        }
    }

    /// The login endpoint answers directly, redirects are left unfollowed unless requested.
    pub fn with_redirects(self, follow_redirects: bool) -> Self {
        Self {
            follow_redirects,
            ..self
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_five_seconds_and_no_redirects() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.conn_timeout, Duration::from_secs(5));
        assert!(!config.follow_redirects);
    }

    #[test]
    fn redirects_can_be_enabled() {
        let config = HttpConfig::new(Duration::from_secs(1), Duration::from_secs(2))
            .with_redirects(true);
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(config.conn_timeout, Duration::from_secs(2));
        assert!(config.follow_redirects);
    }
}
