use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Optional outward notarization of a finalized result. Invoked once per
/// heat after settlement; failure is non-fatal and settlement never blocks
/// on it.
pub trait Notary: Send + Sync {
    fn record(&self, score: f64, elapsed_secs: f64);
}

#[derive(Serialize)]
struct Memo {
    memo: String,
    score: f64,
    elapsed_secs: f64,
}

/// Posts a proof-of-run memo to an external recorder (the original design
/// anchored a memo transaction on-chain; here the collaborator is reached
/// over HTTP). Fire-and-forget: the request runs on its own task.
pub struct HttpNotary {
    client: Client,
    url: String,
}

impl HttpNotary {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

impl Notary for HttpNotary {
    fn record(&self, score: f64, elapsed_secs: f64) {
        let client = self.client.clone();
        let url = self.url.clone();
        let memo = Memo {
            memo: format!(
                "OLYMPIMARKET | SCORE: {:.0} | TIME: {:.1}s",
                score, elapsed_secs
            ),
            score,
            elapsed_secs,
        };

        tokio::spawn(async move {
            let result = client
                .post(&url)
                .timeout(Duration::from_secs(10))
                .json(&memo)
                .send()
                .await;
            match result {
                Ok(response) if response.status().is_success() => {
                    info!("Notarized result: {}", memo.memo);
                }
                Ok(response) => {
                    warn!("Notary rejected memo: HTTP {}", response.status());
                }
                Err(e) => {
                    warn!("Notary unreachable: {}", e);
                }
            }
        });
    }
}

/// Used when notarization is disabled.
pub struct NullNotary;

impl Notary for NullNotary {
    fn record(&self, score: f64, elapsed_secs: f64) {
        debug!(
            "Notarization disabled, dropping record score={:.0} t={:.1}s",
            score, elapsed_secs
        );
    }
}
