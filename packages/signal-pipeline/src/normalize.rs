//! Raw record to canonical job.
//!
//! The normalizer owns identity derivation: a source-provided `id` is used
//! verbatim, otherwise the posting is fingerprinted from its title, company
//! and url so repeated collection runs collapse onto one stored row.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use indexmap::IndexSet;
use regex::Regex;
use tracing::warn;

use crate::error::NormalizationError;
use crate::types::job::CanonicalJob;
use crate::types::raw::{RawRecord, RawValue};

static DISALLOWED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\-.,()]").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Placeholder for an empty title or company.
pub const UNKNOWN: &str = "Unknown";
/// Canonical location for remote-work synonyms.
pub const REMOTE: &str = "Remote";

const REMOTE_SYNONYMS: &[&str] = &["wfh", "work from home", "anywhere", "global"];

/// Date/time layouts tried, in order, after RFC 3339 and RFC 2822.
const DATETIME_WITH_OFFSET: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_DATETIMES: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const NAIVE_DATES: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];

/// Turns producer records into [`CanonicalJob`]s.
///
/// Stateless; shared freely between runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: &RawRecord) -> Result<CanonicalJob, NormalizationError> {
        self.normalize_at(raw, Utc::now())
    }

    /// Normalize with an explicit "now" (fallback for unparseable dates).
    pub fn normalize_at(
        &self,
        raw: &RawRecord,
        now: DateTime<Utc>,
    ) -> Result<CanonicalJob, NormalizationError> {
        let id = derive_id(raw)?;

        let title = or_placeholder(clean_text(&raw.text("title").unwrap_or_default()), UNKNOWN);
        let company =
            or_placeholder(clean_text(&raw.text("company").unwrap_or_default()), UNKNOWN);
        let location = normalize_location(&raw.text("location").unwrap_or_default());
        let stack = normalize_stack(raw.get("stack"));
        let url = normalize_url(&raw.text("url").unwrap_or_default());
        let posted_at = parse_posted_at(raw.get("posted_at"), now, &id);
        let source = raw
            .text("source")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(CanonicalJob {
            id,
            title,
            company,
            location,
            stack,
            url,
            posted_at,
            source,
            raw_payload: raw.to_payload(),
        })
    }
}

/// Source id if present, kept verbatim (surrounding whitespace included),
/// else a 16-hex fingerprint of title + company + url. A blank id counts as
/// absent.
pub fn derive_id(raw: &RawRecord) -> Result<String, NormalizationError> {
    match raw.get("id") {
        RawValue::List(_) => {
            return Err(NormalizationError::InvalidField {
                field: "id".to_string(),
                reason: "expected a scalar, got a list".to_string(),
            })
        }
        value if !value.is_empty() => return Ok(value.to_plain_string()),
        _ => {}
    }

    let title = raw.text("title").unwrap_or_default();
    let company = raw.text("company").unwrap_or_default();
    let url = raw.text("url").unwrap_or_default();
    if title.trim().is_empty() && company.trim().is_empty() && url.trim().is_empty() {
        return Err(NormalizationError::MissingIdentity);
    }

    Ok(fingerprint(&title, &company, &url))
}

/// md5 over the raw concatenation, first 16 hex chars.
pub fn fingerprint(title: &str, company: &str, url: &str) -> String {
    let digest = format!("{:x}", md5::compute(format!("{}{}{}", title, company, url)));
    digest[..16].to_string()
}

/// Strip characters outside `[\w\s\-.,()]`, collapse whitespace, trim.
pub fn clean_text(text: &str) -> String {
    let stripped = DISALLOWED_CHARS.replace_all(text, "");
    WHITESPACE_RUN
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}

fn or_placeholder(value: String, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value
    }
}

/// Remote synonyms map to `"Remote"`; anything else is title-cased.
pub fn normalize_location(location: &str) -> String {
    let cleaned = clean_text(location);
    if cleaned.is_empty() {
        return UNKNOWN.to_string();
    }
    let lower = cleaned.to_lowercase();
    if REMOTE_SYNONYMS.iter().any(|s| lower.contains(s)) {
        return REMOTE.to_string();
    }
    title_case(&cleaned)
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

/// Lower-cased, trimmed tokens in first-seen order without duplicates.
pub fn normalize_stack(value: &RawValue) -> Vec<String> {
    let tokens: Vec<String> = match value {
        RawValue::List(items) => items.clone(),
        RawValue::Text(text) => text.split(',').map(str::to_string).collect(),
        RawValue::Number(_) => vec![value.to_plain_string()],
        RawValue::Timestamp(_) | RawValue::Absent => Vec::new(),
    };

    tokens
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}

/// Trim and default the scheme to `https`.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        format!("https://{}", url)
    }
}

fn parse_posted_at(value: &RawValue, now: DateTime<Utc>, id: &str) -> DateTime<Utc> {
    if value.is_empty() {
        return now;
    }
    match parse_datetime(value) {
        Some(ts) => ts,
        None => {
            warn!(job_id = %id, value = %value.to_plain_string(), "unparseable posted_at, using now");
            now
        }
    }
}

/// Best-effort timestamp parsing. Naive values are taken as UTC.
pub fn parse_datetime(value: &RawValue) -> Option<DateTime<Utc>> {
    match value {
        RawValue::Timestamp(ts) => Some(*ts),
        RawValue::Number(n) => from_epoch(*n),
        RawValue::Text(text) => parse_datetime_str(text.trim()),
        RawValue::List(_) | RawValue::Absent => None,
    }
}

fn parse_datetime_str(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for layout in DATETIME_WITH_OFFSET {
        if let Ok(ts) = DateTime::parse_from_str(text, layout) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for layout in NAIVE_DATETIMES {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for layout in NAIVE_DATES {
        if let Ok(date) = NaiveDate::parse_from_str(text, layout) {
            return date.and_hms_opt(0, 0, 0).map(|d| Utc.from_utc_datetime(&d));
        }
    }
    text.parse::<f64>().ok().and_then(from_epoch)
}

/// Epoch seconds, or milliseconds when the magnitude says so.
fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value.abs() > 1e12 {
        value
    } else {
        value * 1000.0
    };
    DateTime::from_timestamp_millis(millis as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 30, 0).unwrap()
    }

    #[test]
    fn source_id_is_used_verbatim() {
        let raw = RawRecord::new().with("id", 12345_i64).with("title", "Dev");
        let job = Normalizer::new().normalize_at(&raw, fixed_now()).unwrap();
        assert_eq!(job.id, "12345");
    }

    #[test]
    fn fingerprint_is_stable_and_16_hex() {
        let raw = RawRecord::new()
            .with("title", "Backend Engineer")
            .with("company", "Acme")
            .with("url", "https://acme.dev/jobs/1");

        let normalizer = Normalizer::new();
        let a = normalizer.normalize_at(&raw, fixed_now()).unwrap();
        let b = normalizer.normalize_at(&raw, fixed_now()).unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 16);
        assert!(a.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            a.id,
            fingerprint("Backend Engineer", "Acme", "https://acme.dev/jobs/1")
        );
    }

    #[test]
    fn fingerprint_hashes_raw_fields_not_cleaned_ones() {
        let spaced = RawRecord::new().with("title", "Backend  Engineer");
        let single = RawRecord::new().with("title", "Backend Engineer");
        assert_ne!(derive_id(&spaced).unwrap(), derive_id(&single).unwrap());
    }

    #[test]
    fn source_id_is_kept_verbatim() {
        let padded = RawRecord::new().with("id", " abc ").with("title", "Dev");
        let bare = RawRecord::new().with("id", "abc").with("title", "Dev");

        assert_eq!(derive_id(&padded).unwrap(), " abc ");
        assert_ne!(derive_id(&padded).unwrap(), derive_id(&bare).unwrap());
    }

    #[test]
    fn empty_id_falls_back_to_fingerprint() {
        let raw = RawRecord::new().with("id", "  ").with("title", "Dev");
        assert_eq!(derive_id(&raw).unwrap(), fingerprint("Dev", "", ""));
    }

    #[test]
    fn no_identity_is_an_error() {
        let raw = RawRecord::new().with("location", "Remote");
        assert_eq!(derive_id(&raw), Err(NormalizationError::MissingIdentity));

        let listed = RawRecord::new().with("id", vec!["a", "b"]);
        assert!(matches!(
            derive_id(&listed),
            Err(NormalizationError::InvalidField { .. })
        ));
    }

    #[test]
    fn text_cleanup_strips_and_collapses() {
        assert_eq!(clean_text("  Senior   Rust\tEngineer!! "), "Senior Rust Engineer");
        assert_eq!(clean_text("R&D (Platform), Team-B."), "RD (Platform), Team-B.");
        assert_eq!(clean_text("a @ b"), "a b");
    }

    #[test]
    fn empty_fields_get_placeholders() {
        let raw = RawRecord::new().with("url", "acme.dev/1");
        let job = Normalizer::new().normalize_at(&raw, fixed_now()).unwrap();
        assert_eq!(job.title, UNKNOWN);
        assert_eq!(job.company, UNKNOWN);
        assert_eq!(job.location, UNKNOWN);
        assert_eq!(job.source, "unknown");
    }

    #[test]
    fn remote_synonyms_map_to_remote() {
        for input in ["WFH", "Work From Home (US)", "anywhere", "Global", "globally"] {
            assert_eq!(normalize_location(input), REMOTE, "input: {}", input);
        }
        assert_eq!(normalize_location("nairobi, kenya"), "Nairobi, Kenya");
        assert_eq!(normalize_location("NEW YORK"), "New York");
    }

    #[test]
    fn stack_accepts_string_or_list() {
        assert_eq!(
            normalize_stack(&RawValue::from("Python, Django ,,python,SQL")),
            vec!["python", "django", "sql"]
        );
        assert_eq!(
            normalize_stack(&RawValue::from(vec!["Rust", " tokio ", "", "RUST"])),
            vec!["rust", "tokio"]
        );
        assert!(normalize_stack(&RawValue::Absent).is_empty());
    }

    #[test]
    fn url_scheme_defaults_to_https() {
        assert_eq!(normalize_url(" acme.dev/jobs "), "https://acme.dev/jobs");
        assert_eq!(normalize_url("//cdn.acme.dev/x"), "https://cdn.acme.dev/x");
        assert_eq!(normalize_url("http://acme.dev"), "http://acme.dev");
        assert_eq!(normalize_url("HTTPS://acme.dev"), "HTTPS://acme.dev");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn dates_parse_from_common_shapes() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let cases = [
            RawValue::from("2026-03-01T12:00:00Z"),
            RawValue::from("2026-03-01T14:00:00+02:00"),
            RawValue::from("2026-03-01T12:00:00"),
            RawValue::from("2026-03-01 12:00:00"),
            RawValue::from("Sun, 01 Mar 2026 12:00:00 +0000"),
            RawValue::Number(expected.timestamp() as f64),
            RawValue::Number(expected.timestamp_millis() as f64),
            RawValue::from(expected.timestamp().to_string()),
            RawValue::Timestamp(expected),
        ];
        for case in cases {
            assert_eq!(parse_datetime(&case), Some(expected), "case: {:?}", case);
        }

        let midnight = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_datetime(&RawValue::from("2026-03-01")), Some(midnight));
        assert_eq!(parse_datetime(&RawValue::from("01/03/2026")), Some(midnight));
    }

    #[test]
    fn unparseable_date_falls_back_to_now() {
        let raw = RawRecord::new()
            .with("title", "Dev")
            .with("posted_at", "last tuesday-ish");
        let job = Normalizer::new().normalize_at(&raw, fixed_now()).unwrap();
        assert_eq!(job.posted_at, fixed_now());

        let missing = RawRecord::new().with("title", "Dev");
        let job = Normalizer::new().normalize_at(&missing, fixed_now()).unwrap();
        assert_eq!(job.posted_at, fixed_now());
    }

    #[test]
    fn raw_payload_is_kept() {
        let raw = RawRecord::new().with("title", "Dev").with("salary", "100k");
        let job = Normalizer::new().normalize_at(&raw, fixed_now()).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&job.raw_payload).unwrap();
        assert_eq!(payload["salary"], "100k");
    }
}
