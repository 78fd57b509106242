//! Computer Agent - CLI Entry Point
//!
//! Runs one goal against the local desktop:
//! `computer-agent open a terminal and run uptime`

use std::sync::Arc;

use computer_agent::{agent::Agent, computer::DesktopComputer, config::Config, llm::OpenRouterClient};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "computer_agent=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let goal = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if goal.trim().is_empty() {
        anyhow::bail!("usage: computer-agent <goal>");
    }

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, max_steps={}",
        config.default_model, config.max_steps
    );

    let llm = config.channel_models.iter().fold(
        OpenRouterClient::new(config.api_key.clone(), config.default_model.clone()),
        |client, (channel, model)| {
            info!("Routing channel {} to model {}", channel, model);
            client.with_channel_model(channel.clone(), model.clone())
        },
    );
    let llm = Arc::new(llm);
    let computer = Arc::new(DesktopComputer::new());
    let agent = Agent::new(goal, llm, computer, config.agent_options());

    let cancel = agent.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping after the current step");
            cancel.cancel();
        }
    });

    let result = agent
        .run_with(|step| {
            info!("[{}] {}", step.index, step.action.to_json());
        })
        .await;

    println!("{}", result.result);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
