use crate::ApiError;

pub const DEFAULT_RUNTASTIC_BASE_URL: &str = "https://appws.runtastic.com";
pub const DEFAULT_STRAVA_BASE_URL: &str = "https://www.strava.com";
pub const DEFAULT_OAUTH_PORT: u16 = 8080;

/// Service locations. Credentials are supplied separately on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub runtastic_base_url: String,
    pub strava_base_url: String,
    pub oauth_port: u16,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            runtastic_base_url: DEFAULT_RUNTASTIC_BASE_URL.into(),
            strava_base_url: DEFAULT_STRAVA_BASE_URL.into(),
            oauth_port: DEFAULT_OAUTH_PORT,
        }
    }
}

impl Endpoints {
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, ApiError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let runtastic_base_url = get("RUNTASTIC_BASE_URL").unwrap_or(defaults.runtastic_base_url);
        let strava_base_url = get("STRAVA_BASE_URL").unwrap_or(defaults.strava_base_url);
        let oauth_port = match get("STRAVA_OAUTH_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                ApiError::Config(format!("STRAVA_OAUTH_PORT is not a port number: {raw}"))
            })?,
            None => defaults.oauth_port,
        };
        Ok(Self {
            runtastic_base_url,
            strava_base_url,
            oauth_port,
        })
    }
}
