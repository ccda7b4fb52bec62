//! Job board producers.
//!
//! Each producer fetches one board and maps its payload to raw records. The
//! parse functions are pure so they can be tested against fixtures.

pub mod remote_ok;
pub mod sample;
pub mod we_work_remotely;

pub use remote_ok::RemoteOkProducer;
pub use sample::SampleProducer;
pub use we_work_remotely::WeWorkRemotelyProducer;

use std::time::Duration;

use signal_pipeline::ProducerError;

pub const USER_AGENT: &str = "SignalForge/1.0 (Job Aggregator)";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client shared by the real producers.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
}

/// GET `url` and return the body, mapping failures to producer errors.
pub(crate) async fn fetch_text(
    client: &reqwest::Client,
    producer: &str,
    url: &str,
) -> Result<String, ProducerError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProducerError::Request {
            producer: producer.to_string(),
            source: Box::new(e),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProducerError::Status {
            producer: producer.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|e| ProducerError::Decode {
        producer: producer.to_string(),
        reason: e.to_string(),
    })
}
