use std::fs::OpenOptions;
use std::io::Write;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;

use trace2pass_common::AnomalyReport;

use crate::config::{OutputTarget, RuntimeConfig};
use crate::error::RuntimeError;

/// Depth of the emission queue. Bounded so a pathological burst of reports
/// can never grow unbounded memory in the instrumented process — once full,
/// [`Emitter::submit`] drops the report rather than blocking the caller
/// (§4.2 "never suspends the calling thread").
const QUEUE_DEPTH: usize = 4096;

const HTTP_TIMEOUT: Duration = Duration::from_millis(500);

/// Hands reports off a bounded channel to a dedicated background thread,
/// which writes the local diagnostic stream and, if configured, forwards to
/// the collector over HTTP. Modeled on a channel-fed background worker, with
/// the worker moved from an async task onto a plain OS thread: nothing on
/// the submit path may ever await or block.
pub struct Emitter {
    sender: SyncSender<AnomalyReport>,
}

impl Emitter {
    /// Spawns the background worker thread. Call once per process (§9 "no
    /// re-initialization paths") — typically from [`crate::state`]'s
    /// one-shot global init.
    pub fn spawn(config: RuntimeConfig) -> Self {
        let (sender, receiver) = mpsc::sync_channel(QUEUE_DEPTH);
        thread::Builder::new()
            .name("trace2pass-emit".to_string())
            .spawn(move || worker_loop(receiver, config))
            .expect("failed to spawn trace2pass emission thread");
        Self { sender }
    }

    /// Non-blocking submit. Drops the report and logs [`RuntimeError::QueueFull`]
    /// if the worker has fallen behind, rather than ever stalling the caller.
    pub fn submit(&self, report: AnomalyReport) {
        match self.sender.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(error = %RuntimeError::QueueFull, "dropping anomaly report");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::error!("emission worker thread is gone, dropping report");
            }
        }
    }
}

fn worker_loop(receiver: Receiver<AnomalyReport>, config: RuntimeConfig) {
    let http_client = config.collector_url.as_ref().map(|_| {
        reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("failed to build collector http client")
    });

    for report in receiver.iter() {
        write_local(&config.output, &report);
        if let (Some(client), Some(url)) = (&http_client, &config.collector_url) {
            forward_to_collector(client, url, &report);
        }
    }
}

fn write_local(target: &OutputTarget, report: &AnomalyReport) {
    let line = match serde_json::to_string(report) {
        Ok(line) => line,
        Err(err) => {
            tracing::error!(%err, "failed to serialize anomaly report");
            return;
        }
    };
    match target {
        OutputTarget::Stderr => eprintln!("{line}"),
        OutputTarget::File(path) => {
            let opened = OpenOptions::new().create(true).append(true).open(path);
            match opened {
                Ok(mut file) => {
                    if let Err(err) = writeln!(file, "{line}") {
                        tracing::error!(%err, path, "failed to write local diagnostic stream");
                    }
                }
                Err(err) => {
                    tracing::error!(%err, path, "failed to open local diagnostic stream");
                }
            }
        }
    }
}

fn forward_to_collector(client: &reqwest::blocking::Client, url: &str, report: &AnomalyReport) {
    let endpoint = format!("{}/api/v1/report", url.trim_end_matches('/'));
    if let Err(err) = client.post(&endpoint).json(report).send() {
        tracing::warn!(%err, endpoint, "failed to forward anomaly report to collector");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace2pass_common::{AnomalyReportBuilder, CheckDetails};

    #[test]
    fn submit_past_queue_depth_does_not_panic() {
        let config = RuntimeConfig {
            sample_rate: 1.0,
            output: OutputTarget::Stderr,
            collector_url: None,
            all_checks_enabled: false,
        };
        let emitter = Emitter::spawn(config);
        for _ in 0..QUEUE_DEPTH * 2 {
            let report = AnomalyReportBuilder::new(CheckDetails::UnreachableExecuted, 0, 0, 0).finish();
            emitter.submit(report);
        }
    }
}
