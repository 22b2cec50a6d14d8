//!
//! # Outgoing Email
//!
//! Activation and password reset flows notify users by email. Which backend
//! is used comes from `EMAIL_BACKEND`: `smtp` delivers through a STARTTLS
//! relay, while the default `console` backend only logs the message, which
//! is what you want during development.

use std::sync::Arc;

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Config;
use crate::error::AppError;

pub enum Mailer {
    Smtp {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    },
    Console {
        from: Mailbox,
    },
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let from: Mailbox = config
            .email_from
            .parse()
            .map_err(|e| AppError::Service(format!("EMAIL_FROM is not a valid mailbox: {}", e)))?;

        match config.email_backend.as_str() {
            "smtp" => {
                let mut builder =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                        .map_err(|e| {
                            AppError::Service(format!("Failed to configure SMTP relay: {}", e))
                        })?
                        .port(config.smtp_port);
                if let (Some(username), Some(password)) =
                    (config.smtp_username.clone(), config.smtp_password.clone())
                {
                    builder = builder.credentials(Credentials::new(username, password));
                }
                Ok(Mailer::Smtp {
                    transport: builder.build(),
                    from,
                })
            }
            _ => Ok(Mailer::Console { from }),
        }
    }

    pub async fn send(&self, to: &str, subject: &str, body: String) -> Result<(), AppError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::Service(format!("Invalid recipient address: {}", e)))?;

        match self {
            Mailer::Smtp { transport, from } => {
                let message = Message::builder()
                    .from(from.clone())
                    .to(to)
                    .subject(subject)
                    .body(body)
                    .map_err(|e| AppError::Service(format!("Failed to build email: {}", e)))?;
                transport
                    .send(message)
                    .await
                    .map_err(|e| AppError::Service(format!("SMTP delivery failed: {}", e)))?;
                Ok(())
            }
            Mailer::Console { from } => {
                log::info!(
                    "email (console backend) from={} to={} subject={:?}\n{}",
                    from,
                    to,
                    subject,
                    body
                );
                Ok(())
            }
        }
    }
}

/// Sends in the background. Delivery failures are logged and never block
/// or fail the request that triggered the email.
pub fn dispatch(mailer: Arc<Mailer>, to: String, subject: String, body: String) {
    tokio::spawn(async move {
        if let Err(err) = mailer.send(&to, &subject, body).await {
            log::error!("failed to deliver email to {}: {}", to, err);
        }
    });
}

/// Builds the activation email for a freshly registered (or still
/// unverified) account.
pub fn activation_message(base_url: &str, token: &str) -> (String, String) {
    let subject = "Activate your account".to_string();
    let body = format!(
        "Welcome!\n\n\
         Confirm your email address by opening the link below:\n\n\
         {}/activation/confirm/{}/\n\n\
         If you did not create an account, you can ignore this message.\n",
        base_url, token
    );
    (subject, body)
}

/// Builds the password reset email.
pub fn reset_message(base_url: &str, token: &str) -> (String, String) {
    let subject = "Reset your password".to_string();
    let body = format!(
        "Someone requested a password reset for your account.\n\n\
         Submit your new password to the link below to complete the reset:\n\n\
         {}/password-reset/{}\n\n\
         The link works once and expires shortly. If you did not request this,\n\
         you can ignore this message.\n",
        base_url, token
    );
    (subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn console_config() -> Config {
        env::set_var("DATABASE_URL", "postgres://test");
        env::set_var("JWT_SECRET", "mailer-test-secret");
        Config::from_env()
    }

    #[test]
    fn test_activation_message_contains_confirm_link() {
        let (subject, body) = activation_message("http://localhost:8080", "tok123");
        assert_eq!(subject, "Activate your account");
        assert!(body.contains("http://localhost:8080/activation/confirm/tok123/"));
    }

    #[test]
    fn test_reset_message_contains_reset_link() {
        let (_, body) = reset_message("http://localhost:8080", "tok456");
        assert!(body.contains("http://localhost:8080/password-reset/tok456"));
        // The reset confirm route takes the token without a trailing slash.
        assert!(!body.contains("tok456/"));
    }

    #[actix_rt::test]
    async fn test_console_backend_send_succeeds() {
        let mailer = Mailer::from_config(&console_config()).unwrap();
        assert!(matches!(mailer, Mailer::Console { .. }));

        let result = mailer
            .send("user@example.com", "Hello", "A body".to_string())
            .await;
        assert!(result.is_ok());
    }

    #[actix_rt::test]
    async fn test_send_rejects_invalid_recipient() {
        let mailer = Mailer::from_config(&console_config()).unwrap();
        let result = mailer
            .send("not-an-address", "Hello", "A body".to_string())
            .await;
        assert!(result.is_err());
    }
}
