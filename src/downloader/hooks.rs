//! Post-archive script and webhook notifications.

use crate::config::{HooksConfig, ScriptConfig, WebhookConfig};
use crate::types::{Event, GroupCompletion, WebhookPayload};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Runs the configured scripts and webhooks for a completed group
///
/// Everything runs in spawned tasks (fire and forget); failures are logged and emitted
/// as [`Event::ScriptFailed`] / [`Event::WebhookFailed`], never propagated.
#[derive(Clone)]
pub struct ArchiveHooks {
    hooks: Arc<HooksConfig>,
    event_tx: broadcast::Sender<Event>,
}

impl ArchiveHooks {
    /// Bind a hooks configuration to an event channel
    pub fn new(hooks: &HooksConfig, event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            hooks: Arc::new(hooks.clone()),
            event_tx,
        }
    }

    /// Trigger every configured script and webhook for `completion`
    pub fn run(&self, completion: GroupCompletion) {
        if self.hooks.scripts.is_empty() && self.hooks.webhooks.is_empty() {
            tracing::debug!(group_id = %completion.group_id, "No post-archive hooks configured");
            return;
        }

        let env_vars = HashMap::from([
            ("ARCHIVER_GROUP_ID".to_string(), completion.group_id.clone()),
            (
                "ARCHIVER_OUTPUT_DIR".to_string(),
                completion.output_dir.display().to_string(),
            ),
            (
                "ARCHIVER_SUBTASKS".to_string(),
                completion.total_subtasks.to_string(),
            ),
        ]);
        for script in &self.hooks.scripts {
            self.run_script_async(script, &completion, &env_vars);
        }

        if !self.hooks.webhooks.is_empty() {
            self.send_webhooks_async(&completion);
        }
    }

    /// Execute a script asynchronously (fire and forget)
    ///
    /// The script receives the group output directory as its only argument.
    fn run_script_async(
        &self,
        script: &ScriptConfig,
        completion: &GroupCompletion,
        env_vars: &HashMap<String, String>,
    ) {
        let script_path = script.path.clone();
        let timeout = script.timeout;
        let output_dir = completion.output_dir.clone();
        let env_vars = env_vars.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let result = tokio::time::timeout(
                timeout,
                tokio::process::Command::new(&script_path)
                    .arg(&output_dir)
                    .envs(&env_vars)
                    .kill_on_drop(true)
                    .output(),
            )
            .await;

            match result {
                Ok(Ok(output)) if output.status.success() => {
                    tracing::debug!(script = ?script_path, "post-archive script succeeded");
                }
                Ok(Ok(output)) => {
                    let exit_code = output.status.code();
                    tracing::warn!(script = ?script_path, code = ?exit_code, "post-archive script failed");
                    event_tx
                        .send(Event::ScriptFailed {
                            script: script_path,
                            exit_code,
                        })
                        .ok();
                }
                Ok(Err(e)) => {
                    tracing::warn!(script = ?script_path, error = %e, "failed to run post-archive script");
                    event_tx
                        .send(Event::ScriptFailed {
                            script: script_path,
                            exit_code: None,
                        })
                        .ok();
                }
                Err(_) => {
                    tracing::warn!(script = ?script_path, timeout = ?timeout, "post-archive script timed out");
                    event_tx
                        .send(Event::ScriptFailed {
                            script: script_path,
                            exit_code: None,
                        })
                        .ok();
                }
            }
        });
    }

    /// POST the archive notification to every webhook (fire and forget)
    fn send_webhooks_async(&self, completion: &GroupCompletion) {
        let webhooks = self.hooks.webhooks.clone();
        let event_tx = self.event_tx.clone();
        let payload = WebhookPayload {
            event: "archived".to_string(),
            group_id: completion.group_id.clone(),
            output_dir: completion.output_dir.clone(),
            subtasks: completion.total_subtasks,
            timestamp: chrono::Utc::now().timestamp(),
        };

        tokio::spawn(async move {
            let client = reqwest::Client::new();
            for webhook in webhooks {
                if let Err(error) = send_webhook(&client, &webhook, &payload).await {
                    tracing::warn!(url = %webhook.url, error = %error, "webhook failed");
                    event_tx
                        .send(Event::WebhookFailed {
                            url: webhook.url,
                            error,
                        })
                        .ok();
                }
            }
        });
    }
}

async fn send_webhook(
    client: &reqwest::Client,
    webhook: &WebhookConfig,
    payload: &WebhookPayload,
) -> std::result::Result<(), String> {
    let mut request = client
        .post(&webhook.url)
        .json(payload)
        .timeout(webhook.timeout);
    if let Some(auth) = &webhook.auth_header {
        request = request.header("Authorization", auth);
    }

    match tokio::time::timeout(webhook.timeout, request.send()).await {
        Ok(Ok(response)) if response.status().is_success() => {
            tracing::debug!(url = %webhook.url, "webhook sent successfully");
            Ok(())
        }
        Ok(Ok(response)) => Err(format!(
            "Webhook returned status {}: {}",
            response.status(),
            response.text().await.unwrap_or_default()
        )),
        Ok(Err(e)) => Err(format!("Failed to send webhook: {}", e)),
        Err(_) => Err(format!("Webhook timed out after {:?}", webhook.timeout)),
    }
}
