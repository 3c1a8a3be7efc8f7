//! Notification and confirmation emails for form submissions.

use minijinja::{context, Environment};
use serde::Serialize;

use crate::config::EmailConfig;
use crate::intake::{FormType, Submission};
use crate::mailer::OutgoingEmail;

const NOTIFICATION_TEMPLATE: &str = "notification.html";
const CONFIRMATION_TEMPLATE: &str = "confirmation.html";

/// Brand colours shared by both emails.
#[derive(Debug, Serialize)]
struct Palette {
    primary: &'static str,
    primary_light: &'static str,
    accent: &'static str,
    accent_light: &'static str,
    background: &'static str,
    text: &'static str,
    text_secondary: &'static str,
    border: &'static str,
}

const PALETTE: Palette = Palette {
    primary: "#5B3A8F",
    primary_light: "#7B5AAF",
    accent: "#7A9E9B",
    accent_light: "#99B5B3",
    background: "#FAFAFA",
    text: "#1a1a1a",
    text_secondary: "#666666",
    border: "#F0F0F0",
};

/// Display label for a service slug. Unknown slugs are shown as given.
pub fn service_label(slug: &str) -> &str {
    match slug {
        "proofreading" => "Proofreading",
        "editing" => "Editing",
        "typesetting" => "Typesetting",
        "file-conversion" => "File Conversion",
        "self-publishing" => "Self-Publishing Consulting",
        "source-citation" => "Source Citation",
        "copyright-permissions" => "Copyright Permissions Request",
        "scripture-proofreading" => "Scripture Proofreading",
        "other" => "Other",
        other => other,
    }
}

pub fn notification_subject(submission: &Submission) -> String {
    match submission.form_type {
        FormType::Quote => format!("New Quote Request from {}", submission.full_name()),
        _ => format!("New Inquiry from {}", submission.full_name()),
    }
}

pub fn confirmation_subject(brand: &str) -> String {
    format!("We received your message - {}", brand)
}

/// Renders and addresses the two emails sent for every submission.
pub struct EmailComposer {
    env: Environment<'static>,
    config: EmailConfig,
    link_ttl_days: u32,
}

impl EmailComposer {
    pub fn new(config: EmailConfig, link_ttl_days: u32) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template(NOTIFICATION_TEMPLATE, NOTIFICATION_HTML)?;
        env.add_template(CONFIRMATION_TEMPLATE, CONFIRMATION_HTML)?;
        env.add_global("colors", minijinja::Value::from_serialize(&PALETTE));
        env.add_global("brand", config.brand.clone());

        Ok(Self {
            env,
            config,
            link_ttl_days,
        })
    }

    fn from_address(&self) -> String {
        format!("{} <{}>", self.config.brand, self.config.sender)
    }

    /// Email to the operator. `download_url` is linked when the submission has
    /// an attachment.
    pub fn notification(
        &self,
        submission: &Submission,
        download_url: Option<&str>,
    ) -> Result<OutgoingEmail, minijinja::Error> {
        let file_name = submission
            .attachment
            .as_ref()
            .map(|a| a.file_name.as_str());
        let service = match submission.form_type {
            FormType::Quote => submission.service.as_deref().map(service_label),
            _ => None,
        };

        let html = self.env.get_template(NOTIFICATION_TEMPLATE)?.render(context! {
            form_type => submission.form_type,
            name => submission.full_name(),
            email => &submission.email,
            message => &submission.message,
            service => service,
            file_name => file_name,
            download_url => download_url,
            link_ttl_days => self.link_ttl_days,
            response_time => submission.form_type.response_time(),
        })?;

        Ok(OutgoingEmail {
            from: self.from_address(),
            to: vec![self.config.recipient.clone()],
            subject: notification_subject(submission),
            html,
            reply_to: Some(submission.email.clone()),
        })
    }

    /// Email to the submitter.
    pub fn confirmation(&self, submission: &Submission) -> Result<OutgoingEmail, minijinja::Error> {
        let html = self.env.get_template(CONFIRMATION_TEMPLATE)?.render(context! {
            form_type => submission.form_type,
            first_name => &submission.first_name,
            response_time => submission.form_type.response_time(),
            website_url => &self.config.website_url,
            tagline => &self.config.tagline,
        })?;

        Ok(OutgoingEmail {
            from: self.from_address(),
            to: vec![submission.email.clone()],
            subject: confirmation_subject(&self.config.brand),
            html,
            reply_to: None,
        })
    }
}

const NOTIFICATION_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="margin: 0; padding: 0; background-color: {{ colors.background }}; font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;">
    <table width="100%" cellpadding="0" cellspacing="0" style="background-color: {{ colors.background }}; padding: 40px 20px;">
        <tr>
            <td align="center">
                <table width="600" cellpadding="0" cellspacing="0" style="background-color: #ffffff; border-radius: 12px; overflow: hidden; box-shadow: 0 4px 16px rgba(0,0,0,0.1);">
                    <tr>
                        <td style="background: linear-gradient(135deg, {{ colors.primary_light }} 0%, {{ colors.accent_light }} 100%); padding: 30px; text-align: center;">
                            <h1 style="color: #ffffff; margin: 0; font-family: Georgia, 'Times New Roman', serif; font-size: 24px; font-weight: 600;">{{ brand }}</h1>
                            <p style="color: rgba(255, 255, 255, 0.85); margin: 10px 0 0; font-size: 14px; font-weight: 500;">
                                {%- if form_type == "quote" %}New Quote Request{% elif form_type == "review" %}New Review Submission{% else %}New General Inquiry{% endif -%}
                            </p>
                        </td>
                    </tr>
                    <tr>
                        <td style="padding: 30px;">
                            <table width="100%" cellpadding="0" cellspacing="0">
                                <tr>
                                    <td style="padding-bottom: 20px; border-bottom: 1px solid {{ colors.border }};">
                                        <p style="margin: 0 0 5px; color: {{ colors.text_secondary }}; font-size: 12px; text-transform: uppercase; letter-spacing: 0.5px;">From</p>
                                        <p style="margin: 0; color: {{ colors.text }}; font-size: 16px; font-weight: 600;">{{ name }}</p>
                                        <p style="margin: 5px 0 0; color: {{ colors.primary }};">
                                            <a href="mailto:{{ email }}" style="color: {{ colors.primary }}; text-decoration: none;">{{ email }}</a>
                                        </p>
                                    </td>
                                </tr>
{%- if service %}
                                <tr>
                                    <td style="padding: 20px 0; border-bottom: 1px solid {{ colors.border }};">
                                        <p style="margin: 0 0 5px; color: {{ colors.text_secondary }}; font-size: 12px; text-transform: uppercase; letter-spacing: 0.5px;">Service Requested</p>
                                        <p style="margin: 0; color: {{ colors.text }}; font-size: 16px;">{{ service }}</p>
                                    </td>
                                </tr>
{%- endif %}
{%- if file_name and download_url %}
                                <tr>
                                    <td style="padding: 20px 0; border-bottom: 1px solid {{ colors.border }};">
                                        <p style="margin: 0 0 10px; color: {{ colors.text_secondary }}; font-size: 12px; text-transform: uppercase; letter-spacing: 0.5px;">Attached File</p>
                                        <a href="{{ download_url }}" style="display: inline-block; background: linear-gradient(135deg, #f5f0ff 0%, #e6faf8 100%); color: {{ colors.primary }}; padding: 14px 28px; border-radius: 50px; text-decoration: none; font-weight: 600; font-size: 14px; border: 1px solid rgba(91, 58, 143, 0.15);">Download: {{ file_name }}</a>
                                        <p style="margin: 10px 0 0; color: {{ colors.text_secondary }}; font-size: 12px;">This link expires in {{ link_ttl_days }} days</p>
                                    </td>
                                </tr>
{%- endif %}
                                <tr>
                                    <td style="padding: 20px 0;">
                                        <p style="margin: 0 0 10px; color: {{ colors.text_secondary }}; font-size: 12px; text-transform: uppercase; letter-spacing: 0.5px;">
                                            {%- if form_type == "quote" %}Project Details{% elif form_type == "review" %}Review{% else %}Message{% endif -%}
                                        </p>
                                        <p style="margin: 0; color: {{ colors.text }}; font-size: 15px; line-height: 1.6; white-space: pre-wrap;">{{ message }}</p>
                                    </td>
                                </tr>
                            </table>
                        </td>
                    </tr>
                    <tr>
                        <td style="background-color: #f8f8f8; padding: 20px; text-align: center; border-top: 2px solid {{ colors.accent_light }};">
                            <p style="margin: 0; color: {{ colors.text_secondary }}; font-size: 13px;">
                                {%- if form_type == "review" %}Thank you for this customer review!{% else %}Expected response time: <strong>{{ response_time }}</strong>{% endif -%}
                            </p>
                        </td>
                    </tr>
                </table>
            </td>
        </tr>
    </table>
</body>
</html>
"#;

const CONFIRMATION_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="margin: 0; padding: 0; background-color: {{ colors.background }}; font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;">
    <table width="100%" cellpadding="0" cellspacing="0" style="background-color: {{ colors.background }}; padding: 40px 20px;">
        <tr>
            <td align="center">
                <table width="600" cellpadding="0" cellspacing="0" style="background-color: #ffffff; border-radius: 12px; overflow: hidden; box-shadow: 0 4px 16px rgba(0,0,0,0.1);">
                    <tr>
                        <td style="background: linear-gradient(135deg, {{ colors.primary_light }} 0%, {{ colors.accent_light }} 100%); padding: 40px; text-align: center;">
                            <h1 style="color: #ffffff; margin: 0; font-family: Georgia, 'Times New Roman', serif; font-size: 28px; font-weight: 600;">{{ brand }}</h1>
                        </td>
                    </tr>
                    <tr>
                        <td style="padding: 40px;">
                            <h2 style="margin: 0 0 20px; color: {{ colors.primary }}; font-family: Georgia, 'Times New Roman', serif; font-size: 24px;">Thank you, {{ first_name }}!</h2>
{%- if form_type == "review" %}
                            <p style="margin: 0 0 20px; color: {{ colors.text }}; font-size: 16px; line-height: 1.6;">
                                We've received your review and truly appreciate you taking the time to share your experience with us.
                            </p>
                            <p style="margin: 0 0 30px; color: {{ colors.text_secondary }}; font-size: 15px; line-height: 1.6;">
                                Your feedback helps us continue to improve our services and means the world to our team.
                            </p>
{%- else %}
                            <p style="margin: 0 0 20px; color: {{ colors.text }}; font-size: 16px; line-height: 1.6;">
                                We've received your {% if form_type == "quote" %}quote request{% else %}message{% endif %} and will get back to you within
                                <strong style="color: {{ colors.primary }};">{{ response_time }}</strong>.
                            </p>
                            <p style="margin: 0 0 30px; color: {{ colors.text_secondary }}; font-size: 15px; line-height: 1.6;">
                                We appreciate your interest in {{ brand }} and look forward to helping you with your publishing needs.
                            </p>
{%- endif %}
                            <table cellpadding="0" cellspacing="0">
                                <tr>
                                    <td style="background: linear-gradient(135deg, #f5f0ff 0%, #e6faf8 100%); border-radius: 50px; border: 1px solid rgba(91, 58, 143, 0.15);">
                                        <a href="{{ website_url }}" style="display: inline-block; padding: 14px 32px; color: {{ colors.primary }}; text-decoration: none; font-weight: 600; font-size: 14px;">Visit Our Website</a>
                                    </td>
                                </tr>
                            </table>
                        </td>
                    </tr>
                    <tr>
                        <td style="background-color: #f8f8f8; padding: 30px; text-align: center; border-top: 2px solid {{ colors.accent_light }};">
                            <p style="margin: 0 0 5px; color: {{ colors.primary }}; font-family: Georgia, 'Times New Roman', serif; font-weight: 600; font-size: 16px;">{{ brand }}</p>
                            <p style="margin: 0; color: {{ colors.text_secondary }}; font-size: 13px;">{{ tagline }}</p>
                        </td>
                    </tr>
                </table>
                <p style="margin: 20px 0 0; color: {{ colors.text_secondary }}; font-size: 12px; text-align: center;">
                    This is an automated confirmation of your form submission.
                </p>
            </td>
        </tr>
    </table>
</body>
</html>
"#;
