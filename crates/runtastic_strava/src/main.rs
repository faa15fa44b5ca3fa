use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use secrecy::SecretString;

use runtastic_strava::cli::Cli;
use runtastic_strava::oauth::{self, OAuthApp};
use runtastic_strava::{Credentials, DestinationAuth, Orchestrator, Policy, RunOutcome};
use runtastic_strava_client::config::Endpoints;
use runtastic_strava_client::runtastic::{ReqwestRuntasticClient, RuntasticCredentials};
use runtastic_strava_client::strava::ReqwestStravaClient;

fn init_tracing(verbose: bool) {
    // `RUNTASTIC_STRAVA_LOG_LEVEL` wins over `RUST_LOG`; `-v` only raises the default.
    let default = if verbose { "debug" } else { "info" };
    let log_env = std::env::var("RUNTASTIC_STRAVA_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::debug!("runtastic-to-strava: log filter: {}", log_env);
}

async fn strava_token(
    auth: &DestinationAuth,
    endpoints: &Endpoints,
) -> anyhow::Result<SecretString> {
    match auth {
        DestinationAuth::Token(token) => Ok(token.clone()),
        DestinationAuth::OAuth {
            client_id,
            client_secret,
        } => {
            let app = OAuthApp {
                client_id: *client_id,
                client_secret: client_secret.clone(),
                base_url: endpoints.strava_base_url.clone(),
                port: endpoints.oauth_port,
            };
            let token = oauth::obtain_token(app)
                .await
                .context("strava authorization failed")?;
            println!("Strava access granted");
            Ok(token)
        }
    }
}

async fn sync(cli: &Cli, credentials: Credentials) -> anyhow::Result<RunOutcome> {
    let endpoints = Endpoints::from_env()?;
    let options = cli.sync_options();

    let token = strava_token(&credentials.destination, &endpoints).await?;
    if options.policy == Policy::Exhaustive {
        println!(
            "Thorough mode: comparing against the whole Strava history, this takes longer"
        );
    }

    let runtastic = ReqwestRuntasticClient::login(
        &endpoints.runtastic_base_url,
        &RuntasticCredentials {
            email: credentials.email,
            password: credentials.password,
        },
    )
    .await
    .context("runtastic login failed")?;
    println!("Successfully logged into Runtastic");
    tracing::info!(user_id = %runtastic.user_id(), "runtastic session ready");

    let strava = ReqwestStravaClient::new(&endpoints.strava_base_url, token);
    Ok(Orchestrator::new(&runtastic, &strava, options).run().await)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let credentials = match cli.credentials() {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("{e}\n");
            let _ = Cli::command().print_help();
            return Ok(ExitCode::from(1));
        }
    };

    let outcome = sync(&cli, credentials).await?;
    println!("Uploaded {} activities", outcome.uploaded());
    match outcome {
        RunOutcome::Completed { skipped, .. } => {
            if !skipped.is_empty() {
                println!("Skipped {} activities rejected by Strava", skipped.len());
            }
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Aborted { error, .. } => {
            eprintln!("Stopped early: {error}");
            Ok(ExitCode::FAILURE)
        }
    }
}
