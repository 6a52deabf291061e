use std::env::VarError;

use derive_more::Display;
use rootcause::{Report, prelude::ResultExt};
use tracing::info;

use crate::{
    config::{Config, Target},
    provider::DnsProvider,
    public_ip::{self, AddressEcho, ECHO_ENDPOINTS, PublicAddress},
};

/// What a run did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Outcome {
    #[display("created")]
    Created,
    #[display("unchanged")]
    Unchanged,
    #[display("updated")]
    Updated,
}

#[derive(Debug, Display)]
pub enum RunError {
    /// Raised before any network activity.
    #[display("{_0}")]
    Config(Report),
    #[display("{_0}")]
    Runtime(Report),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::Runtime(_) => 2,
        }
    }
}

/// Resolves the configuration, then discovers the public IP and reconciles
/// the record. `connect` builds the echo and DNS clients and is only invoked
/// once the configuration is complete.
pub async fn run<E, P>(
    lookup: impl Fn(&str) -> Result<String, VarError>,
    connect: impl FnOnce(&Config) -> Result<(E, P), Report>,
) -> Result<Outcome, RunError>
where
    E: AddressEcho + Sync,
    P: DnsProvider + Sync,
{
    let config = Config::from_lookup(lookup).map_err(RunError::Config)?;
    update(&config, connect).await.map_err(RunError::Runtime)
}

async fn update<E, P>(
    config: &Config,
    connect: impl FnOnce(&Config) -> Result<(E, P), Report>,
) -> Result<Outcome, Report>
where
    E: AddressEcho + Sync,
    P: DnsProvider + Sync,
{
    info!(endpoint = %config.endpoint, "Setting up clients for the Arsys API");
    let (echo, provider) = connect(config)?;

    info!("Looking up public IP");
    let address = public_ip::discover(&echo, &ECHO_ENDPOINTS).await?;
    info!(ip = %address, "Current public IP");

    let outcome = reconcile(&provider, &config.target, &address).await?;

    info!("Note: DNS propagation can take a few minutes");
    Ok(outcome)
}

/// Makes the target's A record point to `address` with at most one
/// mutating call.
pub async fn reconcile<P>(
    provider: &P,
    target: &Target,
    address: &PublicAddress,
) -> Result<Outcome, Report>
where
    P: DnsProvider + Sync + ?Sized,
{
    info!(
        hostname = %target.hostname,
        domain = %target.domain,
        "Checking for an existing A record"
    );

    let current = provider
        .find_record(target)
        .await
        .attach(format!("For {target}"))?;

    match current {
        None => {
            info!(hostname = %target.hostname, "No A record exists, creating it");
            provider
                .create_record(target, address.as_str())
                .await
                .attach(format!("For {target}"))?;
            info!("[OK] Created {} A {}", target.hostname, address);
            Ok(Outcome::Created)
        }
        Some(current) if current == address.as_str() => {
            info!(
                "[OK] No changes: {} already points to {}",
                target.hostname, address
            );
            Ok(Outcome::Unchanged)
        }
        Some(current) => {
            info!(
                hostname = %target.hostname,
                "Change detected: A {} -> {}", current, address
            );
            provider
                .modify_record(target, &current, address.as_str())
                .await
                .attach(format!("For {target}"))
                .attach(format!("Previous value: {current}"))?;
            info!("[OK] Updated {} A {}", target.hostname, address);
            Ok(Outcome::Updated)
        }
    }
}
