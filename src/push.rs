//! Push forwarding of rendered metrics to a remote write endpoint.
//!
//! Runs alongside the pull endpoint; push failures are logged and never
//! affect collection.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::PushSettings;
use crate::exposition;
use crate::metric::MetricHandle;

/// Periodically render the exposition body and POST it to the configured
/// endpoint until `shutdown` is cancelled.
pub async fn run(settings: PushSettings, handles: Arc<[MetricHandle]>, shutdown: CancellationToken) {
    let client = match reqwest::Client::builder().timeout(settings.timeout).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to build push client, disabling push");
            return;
        }
    };

    tracing::info!(url = %settings.url, interval = ?settings.interval, "push loop started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(settings.interval) => {}
        }

        let body = exposition::render(&handles);
        if body.is_empty() {
            tracing::debug!("no published samples yet, skipping push");
            continue;
        }

        push_with_retries(&client, &settings, body, &shutdown).await;
    }

    tracing::info!("push loop stopped");
}

/// One push cycle: up to `max_retries` attempts, `retry_delay` apart.
/// Exhausted attempts are logged and the cycle is abandoned.
async fn push_with_retries(
    client: &reqwest::Client,
    settings: &PushSettings,
    body: String,
    shutdown: &CancellationToken,
) {
    for attempt in 1..=settings.max_retries {
        match push_once(client, settings, body.clone()).await {
            Ok(()) => {
                tracing::debug!(attempt, "metrics pushed");
                return;
            }
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_retries = settings.max_retries,
                    error = %e,
                    "metrics push failed"
                );
            }
        }
        if attempt < settings.max_retries {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(settings.retry_delay) => {}
            }
        }
    }
    tracing::error!(
        url = %settings.url,
        "metrics push abandoned after {} attempts",
        settings.max_retries
    );
}

async fn push_once(
    client: &reqwest::Client,
    settings: &PushSettings,
    body: String,
) -> Result<(), String> {
    let response = client
        .post(&settings.url)
        .basic_auth(&settings.username, Some(&settings.api_key))
        .header(reqwest::header::CONTENT_TYPE, "text/plain")
        .body(body)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(format!("unexpected status code: {status}"))
    }
}
