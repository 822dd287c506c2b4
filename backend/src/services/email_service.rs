//! Account emails: activation, password reset and password set links.
//!
//! Delivery goes through a `Mailer`. SMTP is used when credentials are
//! configured, otherwise messages are written to the log.

use crate::config::{Config, EmailConfig};
use crate::errors::{ServiceError, ServiceResult};
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::str::FromStr;
use std::sync::Arc;

/// A rendered email ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_content: String,
    pub text_content: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> ServiceResult<()>;
}

/// Delivers email over SMTP.
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> ServiceResult<Self> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| ServiceError::validation(format!("Invalid SMTP host: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        let from = Mailbox::from_str(&format!("{} <{}>", config.from_name, config.from_email))
            .map_err(|e| ServiceError::validation(format!("Invalid from email: {e}")))?;

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> ServiceResult<()> {
        let to_mailbox = Mailbox::from_str(&email.to)
            .map_err(|e| ServiceError::validation(format!("Invalid recipient email: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_content),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_content),
                    ),
            )
            .map_err(|e| ServiceError::validation(format!("Failed to build email: {e}")))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| ServiceError::external_service(format!("Failed to send email: {e}")))?;

        Ok(())
    }
}

/// Writes emails to the log instead of sending them.
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: OutgoingEmail) -> ServiceResult<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Email (console delivery):\n{}",
            email.text_content
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    base_url: String,
    activation_path: String,
    password_reset_path: String,
    password_set_path: String,
}

impl EmailService {
    /// Creates an EmailService, falling back to console delivery when SMTP
    /// is not configured or cannot be set up.
    pub fn new(config: &Config) -> Self {
        let mailer: Arc<dyn Mailer> = match config.email_config() {
            Some(email_config) => match SmtpMailer::new(&email_config) {
                Ok(mailer) => {
                    tracing::info!("Email service initialized with SMTP relay {}", email_config.smtp_host);
                    Arc::new(mailer)
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to initialize SMTP transport: {}. Emails will be logged instead.",
                        e
                    );
                    Arc::new(ConsoleMailer)
                }
            },
            None => {
                tracing::warn!("SMTP credentials not found. Emails will be logged instead.");
                Arc::new(ConsoleMailer)
            }
        };

        Self::with_mailer(config, mailer)
    }

    pub fn with_mailer(config: &Config, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            mailer,
            base_url: config.frontend_url.clone(),
            activation_path: config.accounts.activation_path.clone(),
            password_reset_path: config.accounts.password_reset_path.clone(),
            password_set_path: config.accounts.password_set_path.clone(),
        }
    }

    /// Sends the account activation link.
    pub async fn send_activation_email(
        &self,
        recipient_email: &str,
        username: &str,
        token: &str,
    ) -> ServiceResult<()> {
        let url = self.action_url(&self.activation_path, token);
        self.mailer
            .send(render(
                recipient_email,
                "Activate your Tau account",
                username,
                "Thanks for signing up! Please confirm your email address to activate your account.",
                "Activate account",
                &url,
            ))
            .await
    }

    /// Sends a link for choosing a new password.
    pub async fn send_password_reset_email(
        &self,
        recipient_email: &str,
        username: &str,
        token: &str,
    ) -> ServiceResult<()> {
        let url = self.action_url(&self.password_reset_path, token);
        self.mailer
            .send(render(
                recipient_email,
                "Reset your Tau password",
                username,
                "We received a request to reset your password. If this wasn't you, you can ignore this email.",
                "Reset password",
                &url,
            ))
            .await
    }

    /// Sends a link for setting a first password on an account without one.
    pub async fn send_password_set_email(
        &self,
        recipient_email: &str,
        username: &str,
        token: &str,
    ) -> ServiceResult<()> {
        let url = self.action_url(&self.password_set_path, token);
        self.mailer
            .send(render(
                recipient_email,
                "Set your Tau password",
                username,
                "Your account doesn't have a password yet. Choose one to start signing in.",
                "Set password",
                &url,
            ))
            .await
    }

    fn action_url(&self, path: &str, token: &str) -> String {
        format!("{}/{}/{}", self.base_url, path.trim_matches('/'), token)
    }
}

fn render(
    to: &str,
    subject: &str,
    recipient_name: &str,
    intro: &str,
    action_label: &str,
    url: &str,
) -> OutgoingEmail {
    let html_content = format!(
        r#"
            <!DOCTYPE html>
            <html>
            <head>
                <meta charset="UTF-8">
                <title>{subject}</title>
            </head>
            <body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
                <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
                    <p>Hi {recipient_name},</p>

                    <p>{intro}</p>

                    <div style="text-align: center; margin: 30px 0;">
                        <a href="{url}"
                           style="background-color: #e50914; color: white; padding: 12px 30px;
                                  text-decoration: none; border-radius: 5px; display: inline-block;">
                            {action_label}
                        </a>
                    </div>

                    <p>Or copy and paste this link into your browser:</p>
                    <p style="word-break: break-all; color: #7f8c8d;">{url}</p>
                </div>
            </body>
            </html>
            "#
    );

    let text_content = format!(
        r#"Hi {recipient_name},

{intro}

{action_label}:
{url}
"#
    );

    OutgoingEmail {
        to: to.to_string(),
        subject: subject.to_string(),
        html_content,
        text_content,
    }
}

/// Keeps every email in memory, for tests.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<OutgoingEmail>>,
    pub fail: bool,
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> ServiceResult<()> {
        if self.fail {
            return Err(ServiceError::external_service("SMTP unavailable"));
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[tokio::test]
    async fn test_activation_email_contains_link() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = EmailService::with_mailer(&test_config(), mailer.clone());

        service
            .send_activation_email("test@example.com", "testuser", "tok123")
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "test@example.com");
        assert!(
            sent[0]
                .text_content
                .contains("http://localhost:3000/activate-account/tok123")
        );
        assert!(sent[0].html_content.contains("Hi testuser"));
    }

    #[tokio::test]
    async fn test_console_mailer_never_fails() {
        let email = render("a@example.com", "Subject", "a", "intro", "Go", "http://x");
        assert!(ConsoleMailer.send(email).await.is_ok());
    }
}
