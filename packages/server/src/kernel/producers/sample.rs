//! Fixed sample postings for local runs without network access.

use async_trait::async_trait;
use chrono::Utc;
use signal_pipeline::{Producer, ProducerError, RawRecord};

#[derive(Debug, Default, Clone, Copy)]
pub struct SampleProducer;

impl SampleProducer {
    pub fn new() -> Self {
        Self
    }

    pub fn records() -> Vec<RawRecord> {
        let now = Utc::now();
        vec![
            RawRecord::new()
                .with("id", "sample-001")
                .with("title", "Senior Python Backend Engineer")
                .with("company", "TechCorp")
                .with("location", "Remote")
                .with("url", "https://example.com/job/001")
                .with("posted_at", now)
                .with("stack", "python,django,postgresql,docker")
                .with(
                    "description",
                    "We're looking for a senior backend engineer with Python expertise",
                ),
            RawRecord::new()
                .with("id", "sample-002")
                .with("title", "AI/ML Engineer")
                .with("company", "DataCo")
                .with("location", "Kenya")
                .with("url", "https://example.com/job/002")
                .with("posted_at", now)
                .with("stack", "python,tensorflow,pytorch,aws")
                .with("description", "Join our AI team building ML models"),
            RawRecord::new()
                .with("id", "sample-003")
                .with("title", "Full Stack Developer")
                .with("company", "StartupXYZ")
                .with("location", "Nairobi")
                .with("url", "https://example.com/job/003")
                .with("posted_at", now)
                .with("stack", "javascript,react,nodejs,mongodb")
                .with("description", "Build modern web applications with our team"),
        ]
    }
}

#[async_trait]
impl Producer for SampleProducer {
    fn name(&self) -> &str {
        "sample"
    }

    async fn collect(&self) -> Result<Vec<RawRecord>, ProducerError> {
        Ok(Self::records())
    }
}
