use std::env;

use crate::error::RuntimeError;

const ENV_SAMPLE_RATE: &str = "TRACE2PASS_SAMPLE_RATE";
const ENV_OUTPUT: &str = "TRACE2PASS_OUTPUT";
const ENV_COLLECTOR_URL: &str = "TRACE2PASS_COLLECTOR_URL";
const ENV_ENABLE_ALL_CHECKS: &str = "TRACE2PASS_ENABLE_ALL_CHECKS";

const DEFAULT_SAMPLE_RATE: f64 = 0.01;

/// Where the local diagnostic stream goes.
#[derive(Debug, Clone)]
pub enum OutputTarget {
    Stderr,
    File(String),
}

/// Runtime environment, read once at process start (§6, §9 "no
/// re-initialization paths").
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub sample_rate: f64,
    pub output: OutputTarget,
    pub collector_url: Option<String>,
    pub all_checks_enabled: bool,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let sample_rate = match env::var(ENV_SAMPLE_RATE) {
            Ok(raw) => match raw.parse::<f64>() {
                Ok(rate) if (0.0..=1.0).contains(&rate) => rate,
                Ok(rate) => {
                    tracing::warn!(
                        error = %RuntimeError::InvalidSampleRate(rate),
                        "falling back to default sample rate"
                    );
                    DEFAULT_SAMPLE_RATE
                }
                Err(_) => {
                    tracing::warn!(raw, "unparseable sample rate, using default");
                    DEFAULT_SAMPLE_RATE
                }
            },
            Err(_) => DEFAULT_SAMPLE_RATE,
        };

        let output = match env::var(ENV_OUTPUT) {
            Ok(path) if !path.is_empty() => OutputTarget::File(path),
            _ => OutputTarget::Stderr,
        };

        let collector_url = env::var(ENV_COLLECTOR_URL).ok().filter(|s| !s.is_empty()).and_then(|url| {
            if is_valid_collector_url(&url) {
                Some(url)
            } else {
                tracing::warn!(
                    error = %RuntimeError::InvalidEndpoint(url),
                    "ignoring collector endpoint, forwarding disabled"
                );
                None
            }
        });

        let all_checks_enabled = env::var(ENV_ENABLE_ALL_CHECKS)
            .map(|v| v == "1")
            .unwrap_or(false);

        Self {
            sample_rate,
            output,
            collector_url,
            all_checks_enabled,
        }
    }
}

/// Rejects anything that obviously isn't a URL before it reaches
/// [`crate::emit`]'s HTTP client, rather than discovering it on the first
/// failed send.
fn is_valid_collector_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sample_rate_matches_spec() {
        assert_eq!(DEFAULT_SAMPLE_RATE, 0.01);
    }

    #[test]
    fn rejects_endpoints_without_a_scheme() {
        assert!(!is_valid_collector_url("collector.internal:9000"));
        assert!(!is_valid_collector_url(""));
    }

    #[test]
    fn accepts_http_and_https_endpoints() {
        assert!(is_valid_collector_url("http://collector.internal:9000"));
        assert!(is_valid_collector_url("https://collector.internal"));
    }
}
