// src/services/email.rs
//! Templated email delivery via SES
//!
//! The auth services treat delivery as best-effort or fatal on a per-call
//! basis; this service only reports success or a typed failure.

use aws_config::BehaviorVersion;
use aws_sdk_sesv2::types::{Body as SesBody, Content, Destination, EmailContent, Message};
use aws_sdk_sesv2::Client as SesClient;
use thiserror::Error;
use tracing::{error, info};

use crate::common::safe_email_log;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email sending not configured")]
    NotConfigured,

    #[error("SES operation failed: {0}")]
    SESError(String),
}

/// The templates the auth flows send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    VerificationCode,
    PasswordResetCode,
}

/// Variables injected into a template.
#[derive(Debug, Clone)]
pub struct EmailVariables {
    pub name: String,
    pub code: String,
}

pub struct EmailService {
    from_email: Option<String>,
    frontend_url: String,
}

impl EmailService {
    pub fn new(from_email: Option<String>, frontend_url: String) -> Self {
        Self {
            from_email,
            frontend_url,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.from_email.is_some()
    }

    /// Render and send a templated email to a single recipient.
    pub async fn send_templated_email(
        &self,
        to: &str,
        template: EmailTemplate,
        variables: &EmailVariables,
    ) -> Result<(), EmailError> {
        let from_email = self.from_email.as_deref().ok_or(EmailError::NotConfigured)?;

        let (subject, html) = self.render(template, variables);

        let client = self.ses_client().await;

        let destination = Destination::builder().to_addresses(to).build();

        let subject_content = Content::builder()
            .data(subject)
            .charset("UTF-8")
            .build()
            .map_err(|e| EmailError::SESError(format!("Failed to build subject: {}", e)))?;

        let body_content = Content::builder()
            .data(html)
            .charset("UTF-8")
            .build()
            .map_err(|e| EmailError::SESError(format!("Failed to build body: {}", e)))?;

        let message = Message::builder()
            .subject(subject_content)
            .body(SesBody::builder().html(body_content).build())
            .build();

        let result = client
            .send_email()
            .from_email_address(from_email)
            .destination(destination)
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, to = %safe_email_log(to), "Failed to send email via SES");
                EmailError::SESError(format!("Send failed: {}", e))
            })?;

        info!(
            to = %safe_email_log(to),
            template = ?template,
            message_id = ?result.message_id(),
            "Email sent via SES"
        );

        Ok(())
    }

    async fn ses_client(&self) -> SesClient {
        let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        SesClient::new(&aws_config)
    }

    fn render(&self, template: EmailTemplate, variables: &EmailVariables) -> (String, String) {
        match template {
            EmailTemplate::VerificationCode => (
                "Verify your email".to_string(),
                self.render_code_email(
                    &variables.name,
                    &variables.code,
                    "Use the code below to verify your email address. It expires soon, so enter it while it is fresh.",
                ),
            ),
            EmailTemplate::PasswordResetCode => (
                "Reset your password".to_string(),
                self.render_code_email(
                    &variables.name,
                    &variables.code,
                    "Use the code below to reset your password. If you did not request this, you can safely ignore this email.",
                ),
            ),
        }
    }

    fn render_code_email(&self, name: &str, code: &str, instructions: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .content {{ padding: 20px; background-color: #f9f9f9; }}
        .code {{ font-size: 28px; letter-spacing: 6px; font-weight: bold; text-align: center; padding: 16px; background: #fff; border: 1px solid #e0e0e0; }}
        .footer {{ padding: 20px; text-align: center; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="content">
            <p>Hi {},</p>
            <p>{}</p>
            <div class="code">{}</div>
        </div>
        <div class="footer">
            <p>This is an automated message from <a href="{}">our site</a>. Please do not reply directly to this email.</p>
        </div>
    </div>
</body>
</html>"#,
            name, instructions, code, self.frontend_url
        )
    }
}
