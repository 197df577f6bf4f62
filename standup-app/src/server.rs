//! Wires the config, the template bundle, and the telegram client together
//! and runs until a shutdown signal or a fatal bot error.

use crate::config::Config;
use anyhow::Context;
use standup_core::template::Template;
use standup_telegram::state::Responses;
use standup_telegram::Client;

const TELEGRAM_API_HOST: &str = "api.telegram.org";

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let template = Template::load(&config.telegram.template).with_context(|| {
        format!(
            "failed to load the response template {}",
            config.telegram.template.display()
        )
    })?;
    let responses = Responses::load(&template).context("response template is incomplete")?;

    let client = Client::new(TELEGRAM_API_HOST, &config.telegram.token, responses)
        .context("failed to build the telegram client")?;

    let mut errors = client.start(config.telegram.threads).await;
    tracing::info!(threads = config.telegram.threads, "bot started");

    tokio::select! {
        signal = shutdown_signal() => {
            signal?;
            tracing::info!("shutdown signal received, stopping the bot");
            client.stop().await;
            tracing::info!("bot stopped");
            Ok(())
        }
        error = errors.recv() => {
            client.stop().await;
            match error {
                Some(error) => Err(anyhow::Error::new(error).context("bot crashed")),
                None => Err(anyhow::anyhow!("lifecycle error channel closed unexpectedly")),
            }
        }
    }
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate =
            signal(SignalKind::terminate()).context("failed to install the SIGTERM handler")?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("failed to listen for ctrl-c"),
            _ = terminate.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for ctrl-c")
    }
}
