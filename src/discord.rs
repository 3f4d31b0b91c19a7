pub mod embed;

use chrono::{NaiveDateTime, Utc};
use reqwest::{IntoUrl, Url, blocking::Client};
use serde::Serialize;

use crate::{
    discord::embed::{Color, Embed, Field},
    error::{Error, Result},
    journal::REQUEST_TIMEOUT,
    notify::Notifier,
    validate,
};

/// Posts failures and open sections to a Discord webhook.
///
/// "Checking" and "nothing found" reports are not forwarded.
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    http_client: Client,
    url: Url,
}

#[derive(Debug, Clone, Serialize)]
struct WebhookRequest<'a> {
    username: &'a str,
    embeds: Vec<Embed<'a>>,
}

impl DiscordNotifier {
    pub fn new(webhook_url: impl IntoUrl) -> Result<Self> {
        let url = webhook_url.into_url()?;
        validate_url(&url)?;
        let http_client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http_client, url })
    }

    fn send_embed(&self, embed: Embed) -> Result<()> {
        let body = WebhookRequest {
            username: "Journal Watch",
            embeds: vec![embed],
        };
        let resp = self.http_client.post(self.url.clone()).json(&body).send()?;
        resp.error_for_status()?;
        Ok(())
    }

    fn send_or_log(&self, embed: Embed) {
        if let Err(e) = self.send_embed(embed) {
            log::error!("Sending message to webhook failed: {e}");
        }
    }
}

impl Notifier for DiscordNotifier {
    fn report_checking(&self) {}

    fn report_failure(&self, message: &str) {
        self.send_or_log(Embed {
            title: "Check failed",
            description: message,
            url: None,
            color: Color::FAILURE,
            timestamp: Utc::now(),
            fields: vec![],
        });
    }

    fn report_empty(&self, _next_check: NaiveDateTime) {}

    fn report_available(&self, entries: &[String], link: &Url) {
        log::info!("Sending {} available sections to Discord", entries.len());

        let description = entries.join("\n");
        let count = entries.len().to_string();
        self.send_or_log(Embed {
            title: "Доступна запись",
            description: &description,
            url: Some(link.as_str()),
            color: Color::AVAILABLE,
            timestamp: Utc::now(),
            fields: vec![Field::inline("Sections", &count)],
        });
    }
}

fn validate_url(url: &Url) -> Result<()> {
    assert_url_part("Scheme", "https", url.scheme())?;
    assert_url_part("Host", "discord.com", url.host_str().unwrap_or(""))?;
    let segments = url.path_segments().map_or(vec![], |x| x.collect());
    if segments.len() != 4 {
        return Err(Error::config(format!(
            "Expected 4 webhook URL path segments, got {}",
            segments.len()
        )));
    }
    assert_url_part("Segment #1", "api", segments[0])?;
    assert_url_part("Segment #2", "webhooks", segments[1])?;
    segments[2]
        .parse::<u64>()
        .map_err(|_| Error::config("Invalid Webhook ID"))?;
    validate::generic_token(segments[3])?;
    if let Some(query) = url.query() {
        return Err(Error::config(format!(
            "Expected no webhook URL query, got {query}"
        )));
    }
    if let Some(fragment) = url.fragment() {
        return Err(Error::config(format!(
            "Expected no webhook URL fragment, got {fragment}"
        )));
    }
    Ok(())
}

fn assert_url_part(label: &'static str, expected: &'static str, actual: &str) -> Result<()> {
    if expected != actual {
        return Err(Error::config(format!(
            "Webhook URL {label} is {actual:?} instead of {expected:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_webhook_url() {
        assert!(DiscordNotifier::new("https://discord.com/api/webhooks/1234/abc-DEF_123").is_ok());
    }

    #[test]
    fn rejects_foreign_urls() {
        assert!(DiscordNotifier::new("http://discord.com/api/webhooks/1/abc").is_err());
        assert!(DiscordNotifier::new("https://example.com/api/webhooks/1/abc").is_err());
        assert!(DiscordNotifier::new("https://discord.com/api/webhooks/x/abc").is_err());
        assert!(DiscordNotifier::new("https://discord.com/api/webhooks/1/a%20b").is_err());
        assert!(DiscordNotifier::new("https://discord.com/api/webhooks/1/abc?wait=true").is_err());
        assert!(DiscordNotifier::new("https://discord.com/api/webhooks/1/abc#top").is_err());
    }
}
