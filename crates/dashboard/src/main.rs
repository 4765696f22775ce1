//! Dashboard shell entry point.
//!
//! Restores the persisted session, optionally signs in from
//! `FLOCKDESK_USERNAME`/`FLOCKDESK_PASSWORD`, and then either evaluates the
//! route given as the first argument or follows session changes until Ctrl-C.

use anyhow::Result;

use flockdesk_dashboard::AppState;
use flockdesk_session::{LoginRequest, SessionConfig};

#[tokio::main]
async fn main() -> Result<()> {
    flockdesk_observability::init();

    let config = SessionConfig::from_env();
    tracing::info!(api_url = %config.api_url, "starting dashboard shell");
    let state = AppState::bootstrap(config).await?;

    if let (Ok(username), Ok(password)) = (
        std::env::var("FLOCKDESK_USERNAME"),
        std::env::var("FLOCKDESK_PASSWORD"),
    ) {
        match state.store.login(&LoginRequest::new(username, password)).await {
            Ok(user) => tracing::info!(user = %user.label(), "signed in"),
            Err(err) => tracing::warn!(error = %err, "sign-in failed"),
        }
    }

    if let Some(requested) = std::env::args().nth(1) {
        let decision = state.navigate(&requested);
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    if !state.api.health().await {
        tracing::warn!("backend unreachable; continuing with local session only");
    }

    let mut auth = state.store.subscribe();
    loop {
        tokio::select! {
            changed = auth.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = auth.borrow_and_update().clone();
                match &snapshot.user {
                    Some(user) => tracing::info!(
                        generation = snapshot.generation,
                        user = %user.label(),
                        "session active"
                    ),
                    None => tracing::info!(generation = snapshot.generation, "signed out"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}
