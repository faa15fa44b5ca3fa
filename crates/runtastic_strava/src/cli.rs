//! Command-line argument definitions.

use clap::Parser;
use clap::builder::FalseyValueParser;

use crate::config::Credentials;
use crate::error::SyncResult;
use crate::orchestrator::{FailurePolicy, SyncOptions};
use crate::reconcile::Policy;

const AFTER_HELP: &str = "\
A Strava access token can be given directly with --token. Without one, pass the
client id and secret of a Strava API application and authorize uploads in the
browser; the callback listens on http://127.0.0.1:8080/exchange_token unless
STRAVA_OAUTH_PORT says otherwise.";

/// Copy Runtastic activities to Strava.
///
/// Uploads the Runtastic activities that Strava does not have yet, oldest
/// first, waiting out Strava's rate limits as needed.
#[derive(Debug, Parser)]
#[command(name = "runtastic-to-strava", version, about, after_help = AFTER_HELP)]
pub struct Cli {
    /// Runtastic account email.
    #[arg(long, env = "RUNTASTIC_EMAIL")]
    pub email: Option<String>,

    /// Runtastic account password.
    #[arg(long, env = "RUNTASTIC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Strava access token with activity:write scope.
    #[arg(long, env = "STRAVA_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Strava API application client id.
    #[arg(long, env = "STRAVA_CLIENT_ID")]
    pub id: Option<String>,

    /// Strava API application client secret.
    #[arg(long, env = "STRAVA_CLIENT_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Compare against the whole Strava history instead of only the latest activity.
    #[arg(long, env = "STRAVA_THOROUGH", value_parser = FalseyValueParser::new())]
    pub thorough: bool,

    /// Stop at the first upload Strava rejects instead of skipping it.
    #[arg(long)]
    pub strict: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn credentials(&self) -> SyncResult<Credentials> {
        Credentials::resolve(
            self.email.clone(),
            self.password.clone(),
            self.token.clone(),
            self.id.clone(),
            self.secret.clone(),
        )
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            policy: if self.thorough {
                Policy::Exhaustive
            } else {
                Policy::Bounded
            },
            failure_policy: if self.strict {
                FailurePolicy::Abort
            } else {
                FailurePolicy::Skip
            },
            ..SyncOptions::default()
        }
    }
}
