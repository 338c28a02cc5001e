use std::sync::Arc;

use ai_stylist::adapters::AiTunnelClient;
use ai_stylist::channels::TelegramChannel;
use ai_stylist::config::Settings;
use ai_stylist::engine::Engine;
use ai_stylist::store::{JsonFileStore, ProfileStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let settings = Settings::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export STYLIST_API_KEY=sk-...");
        std::process::exit(1);
    });

    let telegram_token = std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_else(|_| {
        eprintln!("Error: TELEGRAM_BOT_TOKEN not set");
        eprintln!("  export TELEGRAM_BOT_TOKEN=123456:ABC-...");
        std::process::exit(1);
    });
    let allowed_users: Vec<String> = std::env::var("TELEGRAM_ALLOWED_USERS")
        .unwrap_or_else(|_| "*".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    eprintln!("👗 AI Stylist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Chat model: {}", settings.chat_model);
    eprintln!("   Image model: {}", settings.image_model);
    eprintln!("   Profiles: {}", settings.profiles_dir.display());
    eprintln!(
        "   Telegram: enabled (allowed: {})",
        if allowed_users.iter().any(|u| u == "*") {
            "everyone".to_string()
        } else {
            allowed_users.join(", ")
        }
    );

    tokio::fs::create_dir_all(&settings.profiles_dir).await?;
    tokio::fs::create_dir_all(&settings.media_dir).await?;

    let store: Arc<dyn ProfileStore> =
        Arc::new(JsonFileStore::new(settings.profiles_dir.clone()).await?);
    let client = Arc::new(AiTunnelClient::new(&settings)?);

    let mut engine = Engine::new(
        &settings,
        Arc::clone(&store),
        client.clone(),
        client.clone(),
        client,
    );
    let orchestrator = engine.orchestrator();

    // Fail any job a previous process left behind before taking new traffic.
    let recovered = engine.recover_stale().await;
    if recovered > 0 {
        eprintln!("   Recovered {recovered} stale generation jobs");
    }

    let mut telegram = TelegramChannel::new(
        telegram_token,
        allowed_users,
        settings.media_dir.clone(),
    );

    loop {
        tokio::select! {
            batch = telegram.next_events() => {
                let events = match batch {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::warn!(error = %e, "Polling failed, backing off");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };
                for incoming in events {
                    match orchestrator.handle_event(&incoming.user_id, incoming.event).await {
                        Ok(messages) => {
                            deliver_all(&telegram, &incoming.user_id, &messages).await;
                        }
                        Err(e) => {
                            tracing::error!(user_id = %incoming.user_id, error = %e, "Turn failed");
                        }
                    }
                }
            }
            Some(signal) = engine.next_completion() => {
                let user_id = signal.user_id.clone();
                match orchestrator.handle_job_result(signal).await {
                    Ok(messages) => deliver_all(&telegram, &user_id, &messages).await,
                    Err(e) => {
                        tracing::error!(user_id, error = %e, "Completion delivery failed");
                    }
                }
            }
        }
    }
}

async fn deliver_all(
    telegram: &TelegramChannel,
    user_id: &str,
    messages: &[ai_stylist::channels::OutboundMessage],
) {
    for message in messages {
        if let Err(e) = telegram.deliver(user_id, message).await {
            tracing::error!(user_id, error = %e, "Delivery failed");
        }
    }
}
