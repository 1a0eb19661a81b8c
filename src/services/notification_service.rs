use std::sync::Arc;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use crate::error::Result;
use crate::models::outbox_event::OutboxEvent;
use crate::store::OutboxStore;

pub const RESULT_AVAILABLE: &str = "result_available";
pub const EVALUATION_COMPLETE: &str = "evaluation_complete";

/// The two fire-and-forget events the lifecycle emits. Failures here are
/// logged by the caller and never fail the originating operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn result_available(&self, student_id: Uuid, exam_id: Uuid) -> Result<()>;

    async fn evaluation_complete(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
        score: f64,
        total: f64,
    ) -> Result<()>;
}

/// Outbox-backed notifier: emitting an event appends a row after the
/// lifecycle transaction has committed; a background worker delivers it
/// as a signed webhook. Delivery state lives with the event, so a crashed
/// worker resumes where it left off.
#[derive(Clone)]
pub struct NotificationService {
    outbox: Arc<dyn OutboxStore>,
    client: Client,
    target_url: String,
}

impl NotificationService {
    pub fn new(outbox: Arc<dyn OutboxStore>, target_url: String) -> Self {
        Self {
            outbox,
            client: Client::new(),
            target_url,
        }
    }

    fn signature(payload: &str) -> String {
        let secret = &crate::config::get_config().webhook_secret;
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub async fn deliver_once(&self, event: &OutboxEvent) -> Result<()> {
        let body = event.payload.to_string();
        let res = self
            .client
            .post(&self.target_url)
            .header("X-Webhook-Signature", Self::signature(&body))
            .json(&event.payload)
            .send()
            .await;

        match res {
            Ok(resp) => {
                let status = resp.status().as_u16() as i32;
                let text = resp.text().await.unwrap_or_default();
                self.outbox
                    .record_delivery(event.id, Some(status), &text, (200..300).contains(&status))
                    .await?;
            }
            Err(err) => {
                self.outbox
                    .record_delivery(event.id, None, &err.to_string(), false)
                    .await?;
            }
        }
        Ok(())
    }

    /// One worker step: claim the next deliverable event, attempt
    /// delivery, re-arm it for retry if it failed with attempts left.
    /// Returns whether there was anything to do.
    pub async fn run_once(&self) -> Result<bool> {
        let Some(event) = self.outbox.next_pending().await? else {
            return Ok(false);
        };

        let _ = self.deliver_once(&event).await;
        self.outbox.schedule_retry(event.id).await?;

        Ok(true)
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn result_available(&self, student_id: Uuid, exam_id: Uuid) -> Result<()> {
        let payload = json!({
            "event": RESULT_AVAILABLE,
            "student_id": student_id,
            "exam_id": exam_id,
        });
        self.outbox.append(RESULT_AVAILABLE, &payload).await?;
        Ok(())
    }

    async fn evaluation_complete(
        &self,
        student_id: Uuid,
        exam_id: Uuid,
        score: f64,
        total: f64,
    ) -> Result<()> {
        let payload = json!({
            "event": EVALUATION_COMPLETE,
            "student_id": student_id,
            "exam_id": exam_id,
            "score": score,
            "total": total,
        });
        self.outbox.append(EVALUATION_COMPLETE, &payload).await?;
        Ok(())
    }
}
