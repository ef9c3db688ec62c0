//! Outgoing email.
//!
//! The API only needs invitation mail. Delivery goes through the [`Mailer`]
//! trait so deployments can plug in a transport; [`LoggingMailer`] writes
//! the message to the log instead of sending it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use db::models::role::MemberRole;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone)]
pub struct InvitationEmail {
    pub to: String,
    pub inviter_name: String,
    pub target_name: String,
    pub role: MemberRole,
    pub link: String,
    pub expires_at: DateTime<Utc>,
}

impl InvitationEmail {
    pub fn subject(&self) -> String {
        format!("{} invited you to join {}", self.inviter_name, self.target_name)
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_invitation(&self, email: &InvitationEmail) -> Result<(), MailerError>;
}

#[derive(Debug, Clone, Default)]
pub struct LoggingMailer;

#[async_trait]
impl Mailer for LoggingMailer {
    async fn send_invitation(&self, email: &InvitationEmail) -> Result<(), MailerError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject(),
            role = %email.role,
            link = %email.link,
            expires_at = %email.expires_at,
            "invitation email"
        );
        Ok(())
    }
}

/// Link the invitee follows to accept.
pub fn invitation_link(public_base_url: &str, token: &str) -> String {
    format!("{}/invite?token={token}", public_base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_ignores_trailing_slash() {
        assert_eq!(
            invitation_link("https://app.example.com/", "abc"),
            "https://app.example.com/invite?token=abc"
        );
        assert_eq!(
            invitation_link("http://localhost:3000", "abc"),
            "http://localhost:3000/invite?token=abc"
        );
    }

    #[tokio::test]
    async fn logging_mailer_never_fails() {
        let email = InvitationEmail {
            to: "new@example.com".into(),
            inviter_name: "Ada Lovelace".into(),
            target_name: "Acme".into(),
            role: MemberRole::Member,
            link: invitation_link("http://localhost:3000", "t"),
            expires_at: Utc::now(),
        };
        assert_eq!(email.subject(), "Ada Lovelace invited you to join Acme");
        assert!(LoggingMailer.send_invitation(&email).await.is_ok());
    }
}
