use std::{collections::HashSet, time::Duration};

use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;

const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] serde_envfile::Error),
    #[error("`{value}` is not a valid value for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Raw settings as read from the environment.
#[derive(Serialize, Deserialize, Debug)]
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    pub course_api_url: String,

    production: Option<String>,
    operators: Option<String>,
    cache_max_age: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(serde_envfile::from_env()?)
    }

    /// Outside production only operators may run commands.
    pub fn production(&self) -> Result<bool, ConfigError> {
        match self.production.as_deref().map(str::trim) {
            None | Some("") => Ok(false),
            Some(value) => match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    key: "PRODUCTION",
                    value: value.to_owned(),
                }),
            },
        }
    }

    /// Comma separated user ids allowed to use every command.
    pub fn operators(&self) -> Result<HashSet<UserId>, ConfigError> {
        self.operators
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                id.parse::<u64>()
                    .map(UserId)
                    .map_err(|_| ConfigError::Invalid {
                        key: "OPERATORS",
                        value: id.to_owned(),
                    })
            })
            .collect()
    }

    /// How long a cached course stays fresh, in seconds.
    pub fn cache_max_age(&self) -> Result<Duration, ConfigError> {
        match self.cache_max_age.as_deref().map(str::trim) {
            None | Some("") => Ok(DEFAULT_CACHE_MAX_AGE),
            Some(value) => value
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid {
                    key: "CACHE_MAX_AGE",
                    value: value.to_owned(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            discord_token: "token".to_owned(),
            database_url: "postgres://localhost/enrollment".to_owned(),
            course_api_url: "https://enrollment.example.edu/api".to_owned(),
            production: None,
            operators: None,
            cache_max_age: None,
        }
    }

    #[test]
    fn defaults() {
        let config = config();
        assert!(!config.production().unwrap());
        assert!(config.operators().unwrap().is_empty());
        assert_eq!(config.cache_max_age().unwrap(), DEFAULT_CACHE_MAX_AGE);
    }

    #[test]
    fn parses_values() {
        let config = Config {
            production: Some("True".to_owned()),
            operators: Some(" 123, 456 ,".to_owned()),
            cache_max_age: Some("60".to_owned()),
            ..config()
        };

        assert!(config.production().unwrap());
        assert_eq!(
            config.operators().unwrap(),
            HashSet::from([UserId(123), UserId(456)])
        );
        assert_eq!(config.cache_max_age().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn rejects_garbage() {
        let config = Config {
            production: Some("maybe".to_owned()),
            operators: Some("123,abc".to_owned()),
            cache_max_age: Some("-1".to_owned()),
            ..config()
        };

        assert!(config.production().is_err());
        assert!(matches!(
            config.operators(),
            Err(ConfigError::Invalid { key: "OPERATORS", value }) if value == "abc"
        ));
        assert!(config.cache_max_age().is_err());
    }
}
