use tracing::{Level, error, info};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{provider::arsys::ArsysProvider, public_ip::HttpEcho};

mod config;
mod dyndns;
mod provider;
mod public_ip;
mod soap;
#[cfg(test)]
mod testing;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr.with_max_level(Level::WARN).or_else(std::io::stdout)),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let result = dyndns::run(
        |name| std::env::var(name),
        |config| Ok((HttpEcho::new()?, ArsysProvider::new(config)?)),
    )
    .await;

    match result {
        Ok(outcome) => info!(outcome = %outcome, "Done"),
        Err(e) => {
            error!(err = %e, "[FATAL] Update failed");
            std::process::exit(e.exit_code());
        }
    }
}
