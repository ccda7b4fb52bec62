//! We Work Remotely RSS producer.
//!
//! The feed is flat and machine-generated, so items are pulled out with a
//! few regexes rather than a full XML parser.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use signal_pipeline::{Producer, ProducerError, RawRecord};

use super::fetch_text;

const NAME: &str = "weworkremotely";
const FEED_URL: &str = "https://weworkremotely.com/remote-jobs.rss";

static ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<item\b[^>]*>(.*?)</item>").unwrap());

static CDATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*<!\[CDATA\[(.*?)\]\]>\s*$").unwrap());

static TITLE: LazyLock<Regex> = LazyLock::new(|| tag_regex("title"));
static LINK: LazyLock<Regex> = LazyLock::new(|| tag_regex("link"));
static REGION: LazyLock<Regex> = LazyLock::new(|| tag_regex("region"));
static PUB_DATE: LazyLock<Regex> = LazyLock::new(|| tag_regex("pubDate"));
static CATEGORY: LazyLock<Regex> = LazyLock::new(|| tag_regex("category"));

fn tag_regex(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}\b[^>]*>(.*?)</{tag}>")).unwrap()
}

fn tag_text(item: &str, tag: &Regex) -> Option<String> {
    let inner = tag.captures(item)?.get(1)?.as_str();

    let text = match CDATA.captures(inner) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).to_string(),
        None => unescape(inner),
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Split a "Company: Position" title. Titles without a colon keep the whole
/// text as the position and an unknown company.
fn split_title(title: &str) -> (Option<String>, String) {
    match title.split_once(':') {
        Some((company, position)) => (
            Some(company.trim().to_string()),
            position.trim().to_string(),
        ),
        None => (None, title.trim().to_string()),
    }
}

/// Parse an RSS document into raw records. Items with neither a title nor a
/// link are skipped.
pub fn parse_feed(xml: &str) -> Vec<RawRecord> {
    ITEM.captures_iter(xml)
        .filter_map(|caps| {
            let item = caps.get(1)?.as_str();
            let title = tag_text(item, &TITLE);
            let link = tag_text(item, &LINK);
            if title.is_none() && link.is_none() {
                return None;
            }

            let mut record = RawRecord::new();
            if let Some(title) = title {
                let (company, position) = split_title(&title);
                record.insert("title", position);
                record.insert("company", company.unwrap_or_else(|| "Unknown".to_string()));
            }
            if let Some(link) = link {
                record.insert("id", format!("{:x}", md5::compute(link.as_bytes()))[..16].to_string());
                record.insert("url", link);
            }
            record.insert(
                "location",
                tag_text(item, &REGION).unwrap_or_else(|| "Remote".to_string()),
            );
            if let Some(published) = tag_text(item, &PUB_DATE) {
                record.insert("posted_at", published);
            }
            if let Some(category) = tag_text(item, &CATEGORY) {
                record.insert("category", category);
            }
            Some(record)
        })
        .collect()
}

pub struct WeWorkRemotelyProducer {
    client: reqwest::Client,
    url: String,
}

impl WeWorkRemotelyProducer {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            url: FEED_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl Producer for WeWorkRemotelyProducer {
    fn name(&self) -> &str {
        NAME
    }

    async fn collect(&self) -> Result<Vec<RawRecord>, ProducerError> {
        let body = fetch_text(&self.client, NAME, &self.url).await?;
        let records = parse_feed(&body);
        tracing::info!(count = records.len(), "Retrieved We Work Remotely items");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use signal_pipeline::{Normalizer, RawValue};

    const FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>We Work Remotely</title>
    <item>
      <title>Acme &amp; Co: Senior Backend Engineer</title>
      <region>Anywhere in the World</region>
      <category>Back-End Programming</category>
      <pubDate>Tue, 14 Nov 2023 10:00:00 +0000</pubDate>
      <link>https://weworkremotely.com/remote-jobs/acme-senior-backend-engineer</link>
    </item>
    <item>
      <title><![CDATA[Designer wanted]]></title>
      <link>https://weworkremotely.com/remote-jobs/designer</link>
    </item>
    <item>
      <description>no title or link</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_and_splits_titles() {
        let records = parse_feed(FIXTURE);
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.text("company").as_deref(), Some("Acme & Co"));
        assert_eq!(first.text("title").as_deref(), Some("Senior Backend Engineer"));
        assert_eq!(first.text("location").as_deref(), Some("Anywhere in the World"));
        assert_eq!(first.text("id").map(|id| id.len()), Some(16));

        let second = &records[1];
        assert_eq!(second.text("company").as_deref(), Some("Unknown"));
        assert_eq!(second.text("title").as_deref(), Some("Designer wanted"));
        assert_eq!(second.text("location").as_deref(), Some("Remote"));
        assert_eq!(second.get("posted_at"), &RawValue::Absent);
    }

    #[test]
    fn ids_are_stable_per_link() {
        let a = parse_feed(FIXTURE);
        let b = parse_feed(FIXTURE);
        assert_eq!(a[0].text("id"), b[0].text("id"));
        assert_ne!(a[0].text("id"), a[1].text("id"));
    }

    #[test]
    fn pub_date_is_rfc2822() {
        let records = parse_feed(FIXTURE);
        let job = Normalizer::new().normalize(&records[0]).unwrap();
        assert_eq!(job.posted_at, Utc.with_ymd_and_hms(2023, 11, 14, 10, 0, 0).unwrap());
        assert_eq!(job.location, "Remote");
    }

    #[test]
    fn tag_patterns_match_whole_tag_names_with_attributes() {
        let item = r#"<titles>wrong</titles><title lang="en"> Acme: Rust Dev </title><link rel="x">https://a.example/1</link>"#;

        assert_eq!(tag_text(item, &TITLE).as_deref(), Some("Acme: Rust Dev"));
        assert_eq!(tag_text(item, &LINK).as_deref(), Some("https://a.example/1"));
        assert_eq!(tag_text(item, &REGION), None);
        assert_eq!(tag_text("<category>  </category>", &CATEGORY), None);
    }

    #[test]
    fn empty_feed_yields_nothing() {
        assert!(parse_feed("<rss><channel></channel></rss>").is_empty());
        assert!(parse_feed("not xml at all").is_empty());
    }
}
