use std::sync::Arc;

use anyhow::{anyhow, Context};
use futures_util::future::BoxFuture;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::{AppConfig, SmtpConfig};

/// Outbound notification mail. Callers treat every error as non-fatal.
pub trait Notifier: Send + Sync {
    fn send_partner_message(
        &self,
        to_email: &str,
        sender_name: &str,
        content: &str,
    ) -> BoxFuture<'_, anyhow::Result<()>>;

    fn send_invitation(&self, to_email: &str, sender_name: &str)
        -> BoxFuture<'_, anyhow::Result<()>>;
}

pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    base_url: String,
}

impl SmtpNotifier {
    pub fn from_config(config: &SmtpConfig, base_url: &str) -> anyhow::Result<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .context("Invalid SMTP_FROM email address")?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
            .context("Failed to create SMTP relay")?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            mailer,
            from,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send(
        &self,
        to_email: &str,
        subject: String,
        text_body: String,
        html_body: String,
    ) -> anyhow::Result<()> {
        let to_mailbox = to_email
            .trim()
            .parse::<Mailbox>()
            .context("Invalid recipient email address")?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text_body, html_body))
            .context("Failed to build email message")?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

impl Notifier for SmtpNotifier {
    fn send_partner_message(
        &self,
        to_email: &str,
        sender_name: &str,
        content: &str,
    ) -> BoxFuture<'_, anyhow::Result<()>> {
        let to_email = to_email.to_string();
        let (subject, text_body, html_body) =
            partner_message_email(sender_name, content, &self.base_url);
        Box::pin(async move { self.send(&to_email, subject, text_body, html_body).await })
    }

    fn send_invitation(
        &self,
        to_email: &str,
        sender_name: &str,
    ) -> BoxFuture<'_, anyhow::Result<()>> {
        let to_email = to_email.to_string();
        let (subject, text_body, html_body) = invitation_email(sender_name, &self.base_url);
        Box::pin(async move { self.send(&to_email, subject, text_body, html_body).await })
    }
}

/// SMTP when configured, otherwise a notifier that only logs.
pub fn notifier_from_config(config: &AppConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match &config.smtp {
        Some(smtp) => {
            tracing::info!(server = %smtp.server, port = smtp.port, "email notifications enabled");
            Ok(Arc::new(SmtpNotifier::from_config(smtp, &config.app_base_url)?))
        }
        None => {
            tracing::warn!("SMTP is not configured, email notifications are disabled");
            Ok(Arc::new(DisabledNotifier))
        }
    }
}

/// Used when no SMTP relay is configured.
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn send_partner_message(
        &self,
        to_email: &str,
        _sender_name: &str,
        _content: &str,
    ) -> BoxFuture<'_, anyhow::Result<()>> {
        tracing::debug!(to = %to_email, "email disabled, skipping partner message notification");
        Box::pin(async { Ok(()) })
    }

    fn send_invitation(
        &self,
        to_email: &str,
        _sender_name: &str,
    ) -> BoxFuture<'_, anyhow::Result<()>> {
        tracing::debug!(to = %to_email, "email disabled, skipping invitation");
        Box::pin(async { Ok(()) })
    }
}

fn partner_message_email(
    sender_name: &str,
    content: &str,
    base_url: &str,
) -> (String, String, String) {
    let subject = format!("New message from {}", sender_name);
    let text_body = format!(
        "New message from {}\n\n{}\n\nLogin to Together to reply: {}",
        sender_name, content, base_url
    );
    let html_body = format!(
        "<html><body><h2>New message from {}</h2><p>{}</p>\
         <p>Login to <a href=\"{}\">Together</a> to reply.</p></body></html>",
        escape_html(sender_name),
        escape_html(content),
        base_url
    );
    (subject, text_body, html_body)
}

fn invitation_email(sender_name: &str, base_url: &str) -> (String, String, String) {
    let subject = format!("{} has invited you to join Together", sender_name);
    let text_body = format!(
        "{0} has invited you to join Together\n\n{0} would like to connect with you on Together, \
         an app for couples to stay connected.\n\nCreate your account here: {1}/register",
        sender_name, base_url
    );
    let name = escape_html(sender_name);
    let html_body = format!(
        "<html><body><h2>{0} has invited you to join Together</h2>\
         <p>{0} would like to connect with you on Together, an app for couples to stay connected.</p>\
         <p><a href=\"{1}/register\">Click here to create your account</a></p></body></html>",
        name, base_url
    );
    (subject, text_body, html_body)
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partner_message_mail_links_back_and_escapes_content() {
        let (subject, text, html) =
            partner_message_email("Sam", "<b>miss you</b>", "http://together-app.com");
        assert_eq!(subject, "New message from Sam");
        assert!(text.contains("<b>miss you</b>"));
        assert!(text.ends_with("http://together-app.com"));
        assert!(html.contains("&lt;b&gt;miss you&lt;/b&gt;"));
    }

    #[test]
    fn invitation_points_at_register_page() {
        let (subject, text, html) = invitation_email("Alex", "http://localhost:3000");
        assert_eq!(subject, "Alex has invited you to join Together");
        assert!(text.contains("http://localhost:3000/register"));
        assert!(html.contains("href=\"http://localhost:3000/register\""));
    }

    #[tokio::test]
    async fn disabled_notifier_always_succeeds() {
        let notifier = DisabledNotifier;
        assert!(notifier
            .send_partner_message("a@example.com", "Sam", "hi")
            .await
            .is_ok());
        assert!(notifier.send_invitation("b@example.com", "Sam").await.is_ok());
    }

    #[test]
    fn smtp_notifier_rejects_bad_sender_address() {
        let config = SmtpConfig {
            server: "smtp.example.com".into(),
            port: 587,
            username: "user".into(),
            password: "pass".into(),
            from: "not an address".into(),
        };
        assert!(SmtpNotifier::from_config(&config, "http://together-app.com").is_err());
    }
}
