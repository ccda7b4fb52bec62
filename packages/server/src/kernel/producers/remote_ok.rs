//! RemoteOK JSON API producer.

use async_trait::async_trait;
use serde::Deserialize;
use signal_pipeline::{Producer, ProducerError, RawRecord, RawValue};

use super::fetch_text;

const NAME: &str = "remoteok";
const API_URL: &str = "https://remoteok.com/api";

/// One listing as RemoteOK serves it. Everything is optional; the
/// normalizer decides what a usable posting is.
#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    id: serde_json::Value,
    position: Option<String>,
    company: Option<String>,
    location: Option<String>,
    url: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    date: Option<String>,
    epoch: Option<i64>,
    description: Option<String>,
}

impl Listing {
    fn into_record(self) -> RawRecord {
        let mut record = RawRecord::new();
        if !self.id.is_null() {
            record.insert("id", RawValue::from(self.id));
        }
        if let Some(title) = self.position {
            record.insert("title", title);
        }
        if let Some(company) = self.company {
            record.insert("company", company);
        }
        match self.location.filter(|l| !l.trim().is_empty()) {
            Some(location) => record.insert("location", location),
            None => record.insert("location", "Remote"),
        }
        if let Some(url) = self.url {
            record.insert("url", url);
        }
        record.insert("stack", self.tags);
        match (self.epoch, self.date) {
            (Some(epoch), _) => record.insert("posted_at", epoch),
            (None, Some(date)) => record.insert("posted_at", date),
            (None, None) => {}
        }
        if let Some(description) = self.description {
            record.insert("description", description);
        }
        record
    }
}

/// Parse an API response body. The first array element is a legal notice,
/// not a listing.
pub fn parse_listings(body: &str) -> Result<Vec<RawRecord>, ProducerError> {
    let items: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| ProducerError::Decode {
            producer: NAME.to_string(),
            reason: e.to_string(),
        })?;

    let mut records = Vec::with_capacity(items.len().saturating_sub(1));
    for item in items.into_iter().skip(1) {
        match serde_json::from_value::<Listing>(item) {
            Ok(listing) => records.push(listing.into_record()),
            Err(e) => tracing::debug!(error = %e, "Skipping malformed RemoteOK listing"),
        }
    }
    Ok(records)
}

pub struct RemoteOkProducer {
    client: reqwest::Client,
    url: String,
}

impl RemoteOkProducer {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            url: API_URL.to_string(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl Producer for RemoteOkProducer {
    fn name(&self) -> &str {
        NAME
    }

    async fn collect(&self) -> Result<Vec<RawRecord>, ProducerError> {
        let body = fetch_text(&self.client, NAME, &self.url).await?;
        let records = parse_listings(&body)?;
        tracing::info!(count = records.len(), "Retrieved RemoteOK listings");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"[
        {"last_updated": 1700000000, "legal": "API terms apply"},
        {
            "id": "123456",
            "epoch": 1700000000,
            "date": "2023-11-14T22:13:20+00:00",
            "company": "Acme",
            "position": "Senior Rust Engineer",
            "tags": ["rust", "backend"],
            "location": "",
            "url": "https://remoteok.com/remote-jobs/123456"
        },
        {
            "id": 98,
            "date": "2023-11-10T08:00:00+00:00",
            "company": "Globex",
            "position": "Data Engineer",
            "location": "Europe"
        },
        "not an object"
    ]"#;

    #[test]
    fn skips_legal_notice_and_maps_fields() {
        let records = parse_listings(FIXTURE).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.text("id").as_deref(), Some("123456"));
        assert_eq!(first.text("title").as_deref(), Some("Senior Rust Engineer"));
        assert_eq!(first.text("location").as_deref(), Some("Remote"));
        assert_eq!(first.get("stack"), &RawValue::List(vec!["rust".into(), "backend".into()]));
        assert_eq!(first.get("posted_at"), &RawValue::Number(1_700_000_000.0));

        let second = &records[1];
        assert_eq!(second.text("location").as_deref(), Some("Europe"));
        assert_eq!(
            second.text("posted_at").as_deref(),
            Some("2023-11-10T08:00:00+00:00")
        );
    }

    #[test]
    fn listings_normalize_cleanly() {
        let records = parse_listings(FIXTURE).unwrap();
        let job = signal_pipeline::Normalizer::new().normalize(&records[1]).unwrap();

        assert_eq!(job.id, "98");
        assert_eq!(job.company, "Globex");
        assert!(job.stack.is_empty());
    }

    #[test]
    fn non_array_body_is_decode_error() {
        let err = parse_listings(r#"{"error": "rate limited"}"#).unwrap_err();
        assert!(matches!(err, ProducerError::Decode { .. }));
    }

    #[test]
    fn metadata_only_yields_nothing() {
        assert!(parse_listings(r#"[{"legal": "x"}]"#).unwrap().is_empty());
    }
}
