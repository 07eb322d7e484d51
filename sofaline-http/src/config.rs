use std::time::Duration;

use crate::error::Error;

/// Configuration for the HTTP transport.
#[derive(Clone, Debug)]
pub struct Config {
    /// How long a connect may stay pending before the exchange fails
    /// with `ConnectTimedOut`.
    pub connect_timeout: Duration,
    /// Wall-clock budget for the whole exchange, connect included.
    pub transfer_timeout: Duration,
    /// Value of the `User-Agent` header on every request that does not
    /// set its own.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            connect_timeout: Duration::from_secs(2),
            transfer_timeout: Duration::from_secs(60),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
                .to_string(),
        }
    }
}

impl Config {
    /// Validate configuration values. Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<(), Error> {
        if self.connect_timeout.is_zero() {
            return Err(Error::Config("connect_timeout must be non-zero".into()));
        }
        if self.transfer_timeout < self.connect_timeout {
            return Err(Error::Config(
                "transfer_timeout must be >= connect_timeout".into(),
            ));
        }
        if self.user_agent.contains(['\r', '\n']) {
            return Err(Error::Config("user_agent must not contain CR or LF".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_connect_timeout_rejected() {
        let config = Config {
            connect_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn transfer_budget_must_cover_connect() {
        let config = Config {
            connect_timeout: Duration::from_secs(10),
            transfer_timeout: Duration::from_secs(5),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn header_injection_in_user_agent_rejected() {
        let config = Config {
            user_agent: "bad\r\nX-Injected: yes".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
