use super::{Notifier, NotificationTemplates};
use crate::entities::{user, video};
use crate::scoring::Scorecard;
use async_trait::async_trait;
use sendgrid::SGClient;
use sendgrid::{Destination, Mail};
use std::env;
use tracing::{error, info, warn};

/// SendGrid email plus Twilio SMS. Either client may be absent (missing
/// credentials), in which case sends are logged instead of delivered.
#[derive(Clone)]
pub struct TwilioNotifier {
    sendgrid_client: Option<SGClient>,
    twilio_client: Option<twilio::Client>,
    sms_from: String,
    email_from: String,
}

impl TwilioNotifier {
    pub fn from_env() -> Self {
        let sendgrid_api_key = env::var("TWILIO_SENDGRID_API_KEY").ok();
        let twilio_account_sid = env::var("TWILIO_ACCOUNT_SID").ok();
        let twilio_auth_token = env::var("TWILIO_AUTH_TOKEN").ok();
        let sms_from = env::var("TWILIO_SMS_FROM_NUMBER").unwrap_or_default();
        let email_from = env::var("NOTIFICATION_EMAIL_FROM")
            .unwrap_or_else(|_| "scores@garanalysis.com".to_string());

        let sendgrid_client = sendgrid_api_key.map(SGClient::new);

        let twilio_client = if let (Some(sid), Some(token)) = (twilio_account_sid, twilio_auth_token)
        {
            Some(twilio::Client::new(&sid, &token))
        } else {
            None
        };

        if sendgrid_client.is_none() {
            warn!("SendGrid API key not found. Email notifications will be mocked.");
        }
        if twilio_client.is_none() {
            warn!("Twilio credentials not found. SMS notifications will be mocked.");
        }

        Self {
            sendgrid_client,
            twilio_client,
            sms_from,
            email_from,
        }
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), String> {
        if let Some(client) = &self.sendgrid_client {
            // Must own data to move into the blocking task
            let to_email = to_email.to_string();
            let subject = subject.to_string();
            let body = body.to_string();
            let email_from = self.email_from.clone();
            let client = client.clone();
            let to_email_log = to_email.clone();

            match tokio::task::spawn_blocking(move || {
                let mail_info = Mail::new()
                    .add_to(Destination {
                        address: &to_email,
                        name: "Athlete",
                    })
                    .add_from(&email_from)
                    .add_subject(&subject)
                    .add_html(&body);

                client.send(mail_info)
            })
            .await
            {
                Ok(result) => match result {
                    Ok(_) => {
                        info!("Email sent successfully to {}", to_email_log);
                        crate::metrics::increment_notifications_sent("email");
                        Ok(())
                    }
                    Err(e) => {
                        error!("Failed to send email: {}", e);
                        crate::metrics::increment_notifications_failed("email");
                        Err(format!("SendGrid Error: {}", e))
                    }
                },
                Err(e) => Err(format!("Task Join Error: {}", e)),
            }
        } else {
            info!("(Mock) Would send email to: {}", to_email);
            info!("(Mock) Subject: {}", subject);
            crate::metrics::increment_notifications_sent("email");
            Ok(())
        }
    }

    async fn send_sms(&self, to_number: &str, body: &str) -> Result<(), String> {
        if let Some(client) = &self.twilio_client {
            if self.sms_from.is_empty() {
                return Err("TWILIO_SMS_FROM_NUMBER not set".to_string());
            }

            match client
                .send_message(twilio::OutboundMessage::new(&self.sms_from, to_number, body))
                .await
            {
                Ok(_) => {
                    info!("SMS sent successfully to {}", to_number);
                    crate::metrics::increment_notifications_sent("sms");
                    Ok(())
                }
                Err(e) => {
                    error!("Failed to send SMS: {}", e);
                    crate::metrics::increment_notifications_failed("sms");
                    Err(format!("Twilio Error: {}", e))
                }
            }
        } else {
            info!("(Mock) Would send SMS to: {}", to_number);
            info!("(Mock) Body: {}", body);
            crate::metrics::increment_notifications_sent("sms");
            Ok(())
        }
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    async fn video_scored(&self, owner: &user::Model, video: &video::Model, card: &Scorecard) {
        let scored_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let email_body =
            NotificationTemplates::score_report_email(&owner.name, &video.sport, card, &scored_at);
        let subject = format!("Your GAR score is ready: {:.1}", card.overall);

        let email_notifier = self.clone();
        let email_target = owner.email.clone();
        tokio::spawn(async move {
            let _ = email_notifier
                .send_email(&email_target, &subject, &email_body)
                .await;
        });

        if let Some(phone) = owner.phone.clone() {
            let sms_body = NotificationTemplates::score_report_sms(&video.sport, card);
            let sms_notifier = self.clone();
            tokio::spawn(async move {
                let _ = sms_notifier.send_sms(&phone, &sms_body).await;
            });
        }
    }

    async fn video_failed(&self, owner: &user::Model, video: &video::Model, reason: &str) {
        let email_body =
            NotificationTemplates::analysis_failed_email(&owner.name, &video.sport, reason);
        let subject = "Your video could not be analyzed".to_string();

        let email_notifier = self.clone();
        let email_target = owner.email.clone();
        tokio::spawn(async move {
            let _ = email_notifier
                .send_email(&email_target, &subject, &email_body)
                .await;
        });

        if let Some(phone) = owner.phone.clone() {
            let sms_body = NotificationTemplates::analysis_failed_sms(&video.sport, reason);
            let sms_notifier = self.clone();
            tokio::spawn(async move {
                let _ = sms_notifier.send_sms(&phone, &sms_body).await;
            });
        }
    }
}
