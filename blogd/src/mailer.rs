//! Outgoing mail over SMTP, configured from the `SMTP_*` environment variables.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;

use crate::{config::SmtpConfig, errors::Error};

pub struct Mailer {
    transport: MailTransport,
    sender: Mailbox,
}

enum MailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    /// Writes `.eml` files instead of sending, for local development
    File(AsyncFileTransport<Tokio1Executor>),
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transport = match self.transport {
            MailTransport::Smtp(_) => "smtp",
            MailTransport::File(_) => "file",
        };
        f.debug_struct("Mailer")
            .field("transport", &transport)
            .field("sender", &self.sender.to_string())
            .finish()
    }
}

fn parse_mailbox(address: &str, what: &str) -> Result<Mailbox, Error> {
    address.parse::<Mailbox>().map_err(|e| Error::Internal {
        operation: format!("parse {what} address: {e}"),
    })
}

impl Mailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, Error> {
        let sender = config.sender_address().ok_or_else(|| Error::InvalidConfig {
            message: "SMTP_SENDER or SMTP_USER must be set to send mail".to_string(),
        })?;
        let sender = parse_mailbox(sender, "sender")?;

        if !config.secure {
            tracing::warn!("SMTP implicit TLS is disabled - this is not recommended for production");
        }

        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host))
        }
        .map_err(|e| Error::Internal {
            operation: format!("create SMTP transport: {e}"),
        })?
        .port(config.port);

        let builder = match (&config.user, &config.password) {
            (Some(user), Some(password)) => builder.credentials(Credentials::new(user.clone(), password.clone())),
            _ => builder,
        };

        tracing::debug!(host = %config.host, port = config.port, secure = config.secure, "SMTP transport configured");

        Ok(Self {
            transport: MailTransport::Smtp(builder.build()),
            sender,
        })
    }

    /// A mailer that writes messages into `dir` instead of sending them.
    pub fn to_directory(dir: &Path, sender: &str) -> Result<Self, Error> {
        std::fs::create_dir_all(dir).map_err(|e| Error::Internal {
            operation: format!("create mail directory: {e}"),
        })?;

        Ok(Self {
            transport: MailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(dir)),
            sender: parse_mailbox(sender, "sender")?,
        })
    }

    pub fn sender(&self) -> &Mailbox {
        &self.sender
    }

    /// Send one HTML message to `to` (`addr` or `Name <addr>`).
    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), Error> {
        let message = Message::builder()
            .from(self.sender.clone())
            .to(parse_mailbox(to, "recipient")?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build mail message: {e}"),
            })?;

        match &self.transport {
            MailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP mail: {e}"),
                })?;
            }
            MailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("write mail file: {e}"),
                })?;
            }
        }

        tracing::info!(subject, "Mail sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn smtp_config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 465,
            secure: true,
            user: Some("blog@example.com".to_string()),
            password: Some("hunter2".to_string()),
            sender: None,
        }
    }

    #[test]
    fn test_sender_falls_back_to_user() {
        crate::install_crypto_provider();
        let mailer = Mailer::new(&smtp_config()).unwrap();
        assert_eq!(mailer.sender().email.to_string(), "blog@example.com");
    }

    #[test]
    fn test_explicit_sender_with_display_name() {
        crate::install_crypto_provider();
        let config = SmtpConfig {
            sender: Some("Yufan Blog <noreply@example.com>".to_string()),
            secure: false,
            port: 587,
            ..smtp_config()
        };

        let mailer = Mailer::new(&config).unwrap();
        assert_eq!(mailer.sender().name.as_deref(), Some("Yufan Blog"));
        assert_eq!(mailer.sender().email.to_string(), "noreply@example.com");
    }

    #[test]
    fn test_missing_sender_is_rejected() {
        let config = SmtpConfig {
            user: None,
            password: None,
            ..smtp_config()
        };
        assert!(matches!(Mailer::new(&config), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_debug_does_not_leak_credentials() {
        crate::install_crypto_provider();
        let mailer = Mailer::new(&smtp_config()).unwrap();
        let debug = format!("{mailer:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!format!("{:?}", smtp_config()).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_file_transport_writes_message() {
        let dir = TempDir::new().unwrap();
        let mailer = Mailer::to_directory(dir.path(), "Blog <blog@example.com>").unwrap();

        mailer
            .send("reader@example.com", "New reply", "<p>Someone replied to your comment</p>")
            .await
            .unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(files.len(), 1);
        let contents = std::fs::read_to_string(files[0].path()).unwrap();
        assert!(contents.contains("Subject: New reply"));
        assert!(contents.contains("To: reader@example.com"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mailer = Mailer::to_directory(dir.path(), "blog@example.com").unwrap();

        let err = mailer.send("not an address", "Hi", "<p>hi</p>").await.unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }
}
