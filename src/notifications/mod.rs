pub mod templates;
pub mod twilio;

pub use templates::NotificationTemplates;
pub use twilio::TwilioNotifier;

use crate::entities::{user, video};
use crate::scoring::Scorecard;
use async_trait::async_trait;

/// Outbound owner notifications. The orchestrator only fires these off the
/// first successful result write, so impls never need their own dedup.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn video_scored(&self, owner: &user::Model, video: &video::Model, card: &Scorecard);
    async fn video_failed(&self, owner: &user::Model, video: &video::Model, reason: &str);
}

/// Does nothing; used by tests and local runs without provider credentials.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn video_scored(&self, owner: &user::Model, video: &video::Model, card: &Scorecard) {
        tracing::info!(
            owner = %owner.email,
            video_id = %video.id,
            overall = card.overall,
            "notification suppressed (noop notifier)"
        );
    }

    async fn video_failed(&self, owner: &user::Model, video: &video::Model, reason: &str) {
        tracing::info!(
            owner = %owner.email,
            video_id = %video.id,
            reason = reason,
            "notification suppressed (noop notifier)"
        );
    }
}
