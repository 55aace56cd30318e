use std::fmt;

use async_trait::async_trait;
use chrono::Duration;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use uuid::Uuid;

use crate::config::SmtpConfig;
use crate::errors::{AppError, Result};
use crate::models::otp::{Purpose, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<MessageId>;
}

#[derive(Debug, Clone)]
pub struct OtpEmail {
    pub subject: String,
    pub html_body: String,
}

pub fn render_otp_email(code: &str, role: Role, purpose: &Purpose, ttl: Duration) -> OtpEmail {
    // Partial minutes round up
    let minutes = ((ttl.num_seconds() + 59) / 60).max(1);
    let subject = format!("Your EHR {} verification code", role.label());
    let html_body = format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif;">
    <h2>{label} account verification</h2>
    <p>Use the code below to complete your {purpose}.</p>
    <p style="font-size: 28px; letter-spacing: 6px;"><strong>{code}</strong></p>
    <p>This code expires in {minutes} minute{plural} and can only be used once.</p>
    <p>If you did not request this code you can ignore this email.</p>
  </body>
</html>"#,
        label = role.label(),
        purpose = purpose.describe(),
        code = code,
        minutes = minutes,
        plural = if minutes == 1 { "" } else { "s" },
    );

    OtpEmail { subject, html_body }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, from: &str) -> Result<Self> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| AppError::configuration(format!("MAIL_FROM is not a valid mailbox: {}", e)))?;

        let mut builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else if config.host == "localhost" || config.host == "127.0.0.1" {
            // Local catch-all servers (MailHog, Mailpit) speak plain SMTP
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };
        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, to: &str, subject: &str, html_body: &str) -> Result<(Message, MessageId)> {
        let to: Mailbox = to.parse()?;
        let message_id = MessageId(format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain()));

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .message_id(Some(message_id.0.clone()))
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())?;

        Ok((message, message_id))
    }
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<MessageId> {
        let (message, message_id) = self.build_message(to, subject, html_body)?;

        let response = self.transport.send(message).await?;
        if !response.is_positive() {
            return Err(AppError::delivery(format!(
                "SMTP server answered {}",
                response.code()
            )));
        }

        tracing::info!("📧 OTP email {} accepted for {}", message_id, to);
        Ok(message_id)
    }
}

/// Development sender used when no SMTP relay is configured. Writes the message to the log.
pub struct LogMailer;

#[async_trait]
impl MailSender for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<MessageId> {
        let message_id = MessageId(format!("<{}@log.local>", Uuid::new_v4()));
        tracing::warn!(
            "SMTP not configured, email {} for {} not delivered. Subject: {}\n{}",
            message_id,
            to,
            subject,
            html_body
        );
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purpose() -> Purpose {
        Purpose::parse("reset_password").unwrap()
    }

    #[test]
    fn template_carries_code_and_role() {
        let email = render_otp_email("004217", Role::Doctor, &purpose(), Duration::minutes(5));

        assert_eq!(email.subject, "Your EHR Doctor verification code");
        assert!(email.html_body.contains("004217"));
        assert!(email.html_body.contains("Doctor account verification"));
        assert!(email.html_body.contains("reset password"));
        assert!(email.html_body.contains("5 minutes"));
    }

    #[test]
    fn template_rounds_partial_minutes_up() {
        let email = render_otp_email("123456", Role::Admin, &purpose(), Duration::seconds(30));
        assert!(email.html_body.contains("1 minute and"));

        let email = render_otp_email("123456", Role::Admin, &purpose(), Duration::seconds(90));
        assert!(email.html_body.contains("2 minutes and"));

        let email = render_otp_email("123456", Role::Admin, &purpose(), Duration::seconds(120));
        assert!(email.html_body.contains("2 minutes and"));
    }

    fn local_config() -> SmtpConfig {
        SmtpConfig {
            host: "localhost".to_string(),
            port: 1025,
            username: None,
            password: None,
        }
    }

    #[test]
    fn smtp_mailer_rejects_bad_sender() {
        let result = SmtpMailer::new(&local_config(), "not a mailbox");
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn smtp_message_gets_id_from_sender_domain() {
        let mailer = SmtpMailer::new(&local_config(), "EHR Portal <no-reply@clinic.test>").unwrap();

        let (message, id) = mailer
            .build_message("a@x.com", "Subject", "<p>hi</p>")
            .unwrap();
        assert!(id.0.ends_with("@clinic.test>"));

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("To: a@x.com"));
        assert!(raw.contains("Subject: Subject"));

        assert!(matches!(
            mailer.build_message("nobody", "Subject", "body"),
            Err(AppError::DeliveryError(_))
        ));
    }

    #[tokio::test]
    async fn log_mailer_always_accepts() {
        let id = LogMailer.send("a@x.com", "Subject", "<p>123456</p>").await.unwrap();
        assert!(id.0.ends_with("@log.local>"));
    }
}
