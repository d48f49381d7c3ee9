//! Token lifetimes written as `"<n>h"` or `"<n>d"`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid token lifetime '{0}', expected e.g. '12h' or '7d'")]
pub struct LifetimeParseError(String);

/// How long issued tokens stay valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Lifetime {
    Hours(u64),
    Days(u64),
}

impl Lifetime {
    pub fn as_duration(&self) -> Duration {
        match self {
            Lifetime::Hours(hours) => Duration::from_secs(hours.saturating_mul(3_600)),
            Lifetime::Days(days) => Duration::from_secs(days.saturating_mul(86_400)),
        }
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime::Days(7)
    }
}

impl FromStr for Lifetime {
    type Err = LifetimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || LifetimeParseError(s.to_string());

        if let Some(hours) = trimmed.strip_suffix('h') {
            hours.parse().map(Lifetime::Hours).map_err(|_| invalid())
        } else if let Some(days) = trimmed.strip_suffix('d') {
            days.parse().map(Lifetime::Days).map_err(|_| invalid())
        } else {
            Err(invalid())
        }
    }
}

impl TryFrom<String> for Lifetime {
    type Error = LifetimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Lifetime> for String {
    fn from(lifetime: Lifetime) -> Self {
        lifetime.to_string()
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Hours(hours) => write!(f, "{hours}h"),
            Lifetime::Days(days) => write!(f, "{days}d"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lifetimes() {
        assert_eq!("1h".parse::<Lifetime>().unwrap(), Lifetime::Hours(1));
        assert_eq!("7d".parse::<Lifetime>().unwrap(), Lifetime::Days(7));
        assert_eq!(
            "2d".parse::<Lifetime>().unwrap().as_duration(),
            Duration::from_secs(172_800)
        );

        assert!("".parse::<Lifetime>().is_err());
        assert!("7w".parse::<Lifetime>().is_err());
        assert!("h".parse::<Lifetime>().is_err());
        assert!("-1d".parse::<Lifetime>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        #[derive(Deserialize)]
        struct Wrapper {
            lifetime: Lifetime,
        }

        let parsed: Wrapper = toml::from_str(r#"lifetime = "12h""#).unwrap();
        assert_eq!(parsed.lifetime, Lifetime::Hours(12));
        assert!(toml::from_str::<Wrapper>(r#"lifetime = "soon""#).is_err());
    }
}
