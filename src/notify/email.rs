// src/notify/email.rs
//! Verification-email collaborator.
//!
//! Missing SMTP configuration degrades to a simulated success with a
//! warning instead of a hard failure, so a half-configured deployment still
//! lets operators through.

use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};
use tracing::{info, warn};

use super::{CallerIdentity, MailError, MailOutcome};

#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub email: String,
    pub display_name: Option<String>,
}

enum MailTransport {
    Smtp {
        mailer: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    },
    /// No credentials configured; sends are logged and reported simulated.
    Simulated,
}

pub struct VerificationMailer {
    transport: MailTransport,
    verify_url: String,
}

impl VerificationMailer {
    /// Build from SMTP_HOST / SMTP_USER / SMTP_PASS / MAIL_FROM. Any of
    /// them missing selects the simulated transport.
    pub fn from_env() -> Self {
        let verify_url = std::env::var("MAIL_VERIFY_URL")
            .unwrap_or_else(|_| "https://kanta02cer.github.io/JAA.HP/admin/news-console.html".into());

        let vars = (
            std::env::var("SMTP_HOST"),
            std::env::var("SMTP_USER"),
            std::env::var("SMTP_PASS"),
            std::env::var("MAIL_FROM"),
        );
        let transport = match vars {
            (Ok(host), Ok(user), Ok(pass), Ok(from_addr)) => {
                let from = match from_addr.parse::<Mailbox>() {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(error = %e, "invalid MAIL_FROM; falling back to simulated mailer");
                        return Self {
                            transport: MailTransport::Simulated,
                            verify_url,
                        };
                    }
                };
                match AsyncSmtpTransport::<Tokio1Executor>::relay(&host) {
                    Ok(builder) => MailTransport::Smtp {
                        mailer: builder.credentials(Credentials::new(user, pass)).build(),
                        from,
                    },
                    Err(e) => {
                        warn!(error = %e, "invalid SMTP_HOST; falling back to simulated mailer");
                        MailTransport::Simulated
                    }
                }
            }
            _ => {
                warn!("SMTP configuration missing; verification mails will be simulated");
                MailTransport::Simulated
            }
        };

        Self {
            transport,
            verify_url,
        }
    }

    #[cfg(test)]
    fn simulated() -> Self {
        Self {
            transport: MailTransport::Simulated,
            verify_url: "https://example.invalid/verify".into(),
        }
    }

    /// Send a verification mail. Requires an authenticated caller and a
    /// non-empty address, mirroring the callable-function contract.
    pub async fn send(
        &self,
        req: &VerificationRequest,
        caller: Option<&CallerIdentity>,
    ) -> Result<MailOutcome, MailError> {
        let caller = caller.ok_or(MailError::Unauthenticated)?;
        if req.email.trim().is_empty() {
            return Err(MailError::InvalidArgument("email is required".into()));
        }

        let name = req.display_name.as_deref().unwrap_or("ご担当者");
        let subject = "【メール確認のお願い】日本学生アンバサダー協会";
        let body = format!(
            "{name} 様\n\n\
             アカウントのご登録ありがとうございます。以下のリンクからメールアドレスの確認を完了してください。\n\
             {url}\n\n\
             このメールは送信専用です。ご不明点はサイトの「お問い合わせ」からお願いいたします。\n",
            name = name,
            url = self.verify_url,
        );

        match &self.transport {
            MailTransport::Simulated => {
                info!(uid = %caller.uid, to = %req.email, "simulated verification mail");
                Ok(MailOutcome {
                    ok: true,
                    simulated: true,
                })
            }
            MailTransport::Smtp { mailer, from } => {
                let to: Mailbox = req
                    .email
                    .parse()
                    .map_err(|_| MailError::InvalidArgument("email is malformed".into()))?;
                let msg = Message::builder()
                    .from(from.clone())
                    .to(to)
                    .subject(subject)
                    .header(header::ContentType::TEXT_PLAIN)
                    .body(body)
                    .map_err(|e| MailError::Transport(e.to_string()))?;

                mailer
                    .send(msg)
                    .await
                    .map_err(|e| MailError::Transport(e.to_string()))?;
                info!(uid = %caller.uid, to = %req.email, "verification mail sent");
                Ok(MailOutcome {
                    ok: true,
                    simulated: false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(email: &str) -> VerificationRequest {
        VerificationRequest {
            email: email.into(),
            display_name: Some("山田".into()),
        }
    }

    #[tokio::test]
    async fn unauthenticated_caller_is_rejected() {
        let mailer = VerificationMailer::simulated();
        let err = mailer.send(&req("a@example.com"), None).await.unwrap_err();
        assert!(matches!(err, MailError::Unauthenticated));
    }

    #[tokio::test]
    async fn empty_email_is_invalid_argument() {
        let mailer = VerificationMailer::simulated();
        let caller = CallerIdentity { uid: "u1".into() };
        let err = mailer.send(&req("  "), Some(&caller)).await.unwrap_err();
        assert!(matches!(err, MailError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn missing_config_simulates_success() {
        let mailer = VerificationMailer::simulated();
        let caller = CallerIdentity { uid: "u1".into() };
        let out = mailer.send(&req("a@example.com"), Some(&caller)).await.unwrap();
        assert!(out.ok);
        assert!(out.simulated);
    }
}
