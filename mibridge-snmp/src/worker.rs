//! Per-target poll loop: read, decode, serialize, publish.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use mibridge_framework::{BrokerConfig, Envelope, LoggingHooks, PublishSink, Publisher};

use crate::config::{ConnectPolicy, ExhaustionPolicy, TargetConfig};
use crate::decoder::DeviceClass;
use crate::session::{SampleReader, SessionError, SnmpSession};

/// Result of a single poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Published,
    ReadFailed,
    DecodeFailed,
    SerializeFailed,
    PublishFailed,
    Cancelled,
}

/// Counters kept by a worker over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub ticks: u64,
    pub published: u64,
    pub read_failures: u64,
    pub decode_failures: u64,
    pub serialize_failures: u64,
    pub publish_failures: u64,
}

impl WorkerStats {
    fn record(&mut self, outcome: TickOutcome) {
        let counter = match outcome {
            TickOutcome::Published => &mut self.published,
            TickOutcome::ReadFailed => &mut self.read_failures,
            TickOutcome::DecodeFailed => &mut self.decode_failures,
            TickOutcome::SerializeFailed => &mut self.serialize_failures,
            TickOutcome::PublishFailed => &mut self.publish_failures,
            TickOutcome::Cancelled => return,
        };
        *counter += 1;
        self.ticks += 1;
    }
}

/// Polls one target forever and publishes every decoded record.
///
/// A failed cycle is logged and skipped; the loop itself only stops on
/// cancellation or after `max_ticks` cycles.
pub struct PollWorker<R, P> {
    name: String,
    class: DeviceClass,
    topic: String,
    reader: R,
    sink: P,
    delay: Duration,
    max_ticks: Option<u64>,
}

impl<R: SampleReader, P: PublishSink> PollWorker<R, P> {
    pub fn new(target: &TargetConfig, topic: impl Into<String>, reader: R, sink: P) -> Self {
        Self {
            name: target.name.clone(),
            class: target.class,
            topic: topic.into(),
            reader,
            sink,
            delay: target.poll_delay(),
            max_ticks: None,
        }
    }

    /// Stop after `ticks` cycles.
    pub fn with_max_ticks(mut self, ticks: Option<u64>) -> Self {
        self.max_ticks = ticks;
        self
    }

    /// Pause between two cycles.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run until cancelled, then release the sink.
    pub async fn run(mut self, cancel: CancellationToken) -> WorkerStats {
        let mut stats = WorkerStats::default();

        tracing::info!(
            device = %self.name,
            class = self.class.as_str(),
            topic = %self.topic,
            "Starting poll worker"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }
            if self.max_ticks.is_some_and(|max| stats.ticks >= max) {
                break;
            }

            let outcome = self.tick(&cancel).await;
            if outcome == TickOutcome::Cancelled {
                break;
            }
            stats.record(outcome);

            if self.max_ticks.is_some_and(|max| stats.ticks >= max) {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.delay) => {}
            }
        }

        self.sink.close().await;

        tracing::info!(
            device = %self.name,
            ticks = stats.ticks,
            published = stats.published,
            read_failures = stats.read_failures,
            decode_failures = stats.decode_failures,
            publish_failures = stats.publish_failures,
            "Poll worker stopped"
        );

        stats
    }

    /// One cycle. At most one publish happens per call.
    pub async fn tick(&mut self, cancel: &CancellationToken) -> TickOutcome {
        let read = tokio::select! {
            _ = cancel.cancelled() => return TickOutcome::Cancelled,
            read = self.reader.poll() => read,
        };

        let sample = match read {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!(device = %self.name, error = %e, "SNMP poll failed");
                return TickOutcome::ReadFailed;
            }
        };

        for (index, varbind) in sample.iter().enumerate() {
            tracing::debug!(
                device = %self.name,
                index,
                oid = %varbind.oid,
                value = %varbind.value,
                "Read value"
            );
        }

        let record = match self.class.decode(&sample) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(device = %self.name, error = %e, "Sample does not match device class");
                return TickOutcome::DecodeFailed;
            }
        };

        let payload = match record.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(device = %self.name, error = %e, "Failed to serialize record");
                return TickOutcome::SerializeFailed;
            }
        };

        let envelope = Envelope::new(self.topic.clone(), payload);
        let published = tokio::select! {
            _ = cancel.cancelled() => return TickOutcome::Cancelled,
            published = self.sink.publish(&envelope) => published,
        };

        match published {
            Ok(()) => {
                tracing::trace!(device = %self.name, topic = %self.topic, "Published record");
                TickOutcome::Published
            }
            Err(e) => {
                tracing::warn!(device = %self.name, error = %e, "Publish failed");
                TickOutcome::PublishFailed
            }
        }
    }
}

/// Connect a target's sink and session, then poll until cancelled.
///
/// `cancel` stops this worker only; `shutdown` is cancelled when the
/// target exhausts its connection attempts under [`ExhaustionPolicy::Shutdown`].
pub async fn run_target(
    target: TargetConfig,
    broker: BrokerConfig,
    policy: ConnectPolicy,
    cancel: CancellationToken,
    shutdown: CancellationToken,
    max_ticks: Option<u64>,
) -> anyhow::Result<()> {
    let client_id = target.client_id();
    let topic = target.topic(&broker).to_string();

    let sink = Publisher::connect(&broker, &client_id, Arc::new(LoggingHooks), &cancel).await?;

    let session = match Box::pin(SnmpSession::connect(&target, &policy, &cancel)).await {
        Ok(session) => session,
        Err(SessionError::Cancelled) => {
            sink.close().await;
            return Ok(());
        }
        Err(e) => {
            sink.close().await;
            if policy.on_exhausted == ExhaustionPolicy::Shutdown {
                tracing::error!(device = %target.name, "Connection attempts exhausted, shutting down");
                shutdown.cancel();
            }
            return Err(e.into());
        }
    };

    tracing::info!(
        device = %target.name,
        address = %session.address(),
        client_id = %client_id,
        "Target connected"
    );

    PollWorker::new(&target, topic, session, sink)
        .with_max_ticks(max_ticks)
        .run(cancel)
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{RawSample, SampleValue};
    use async_trait::async_trait;
    use mibridge_framework::BridgeError;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ScriptedReader {
        script: VecDeque<Result<RawSample, SessionError>>,
        fallback: RawSample,
    }

    impl ScriptedReader {
        fn repeating(sample: RawSample) -> Self {
            Self {
                script: VecDeque::new(),
                fallback: sample,
            }
        }

        fn then(mut self, step: Result<RawSample, SessionError>) -> Self {
            self.script.push_back(step);
            self
        }
    }

    #[async_trait]
    impl SampleReader for ScriptedReader {
        async fn poll(&mut self) -> Result<RawSample, SessionError> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Ok(self.fallback.clone()))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        published: Arc<Mutex<Vec<Envelope>>>,
        closed: Arc<AtomicBool>,
        fail: bool,
    }

    #[async_trait]
    impl PublishSink for RecordingSink {
        async fn publish(&self, envelope: &Envelope) -> mibridge_framework::Result<()> {
            if self.fail {
                return Err(BridgeError::PublishTimeout {
                    topic: envelope.topic.clone(),
                });
            }
            self.published.lock().unwrap().push(envelope.clone());
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn avtech() -> TargetConfig {
        TargetConfig::new(
            "avtech",
            DeviceClass::Temperature,
            vec!["t1".to_string(), "t2".to_string(), "t3".to_string()],
        )
    }

    fn reading(c: i64, f: i64, label: &str) -> RawSample {
        RawSample::default()
            .with("t1", SampleValue::integer(c))
            .with("t2", SampleValue::integer(f))
            .with("t3", SampleValue::text(label))
    }

    fn timeout_error() -> SessionError {
        SessionError::Timeout {
            address: "10.0.0.2:161".to_string(),
            timeout_ms: 2000,
        }
    }

    #[tokio::test]
    async fn test_tick_publishes_decoded_record() {
        let sink = RecordingSink::default();
        let mut worker = PollWorker::new(
            &avtech(),
            "test",
            ScriptedReader::repeating(reading(250, 770, "SensorA")),
            sink.clone(),
        );

        let outcome = worker.tick(&CancellationToken::new()).await;

        assert_eq!(outcome, TickOutcome::Published);
        let published = sink.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "test");
        assert_eq!(
            published[0].payload,
            br#"{"Celcius":250,"Fahrenheit":770,"Label":"SensorA"}"#
        );
    }

    #[tokio::test]
    async fn test_read_failure_does_not_stop_polling() {
        let sink = RecordingSink::default();
        let reader = ScriptedReader::repeating(reading(20, 68, "Rack"))
            .then(Err(timeout_error()))
            .then(Ok(reading(21, 69, "Rack")));

        let stats = PollWorker::new(&avtech(), "test", reader, sink.clone())
            .with_delay(Duration::from_millis(1))
            .with_max_ticks(Some(3))
            .run(CancellationToken::new())
            .await;

        assert_eq!(stats.ticks, 3);
        assert_eq!(stats.read_failures, 1);
        assert_eq!(stats.published, 2);
        assert!(sink.closed.load(Ordering::SeqCst));

        let published = sink.published.lock().unwrap();
        assert_eq!(
            published[0].payload,
            br#"{"Celcius":21,"Fahrenheit":69,"Label":"Rack"}"#
        );
    }

    #[tokio::test]
    async fn test_decode_failure_skips_publish() {
        let sink = RecordingSink::default();
        let short = RawSample::default().with("t1", SampleValue::integer(1));
        let reader = ScriptedReader::repeating(reading(1, 34, "x")).then(Ok(short));

        let mut worker = PollWorker::new(&avtech(), "test", reader, sink.clone());
        let cancel = CancellationToken::new();

        assert_eq!(worker.tick(&cancel).await, TickOutcome::DecodeFailed);
        assert!(sink.published.lock().unwrap().is_empty());

        assert_eq!(worker.tick(&cancel).await, TickOutcome::Published);
        assert_eq!(sink.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_is_counted() {
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };

        let stats = PollWorker::new(
            &avtech(),
            "test",
            ScriptedReader::repeating(reading(1, 34, "x")),
            sink,
        )
        .with_delay(Duration::from_millis(1))
        .with_max_ticks(Some(2))
        .run(CancellationToken::new())
        .await;

        assert_eq!(stats.publish_failures, 2);
        assert_eq!(stats.published, 0);
    }

    #[tokio::test]
    async fn test_identical_samples_give_identical_envelopes() {
        let sink = RecordingSink::default();

        PollWorker::new(
            &avtech(),
            "lab/temp",
            ScriptedReader::repeating(reading(22, 71, "Rack")),
            sink.clone(),
        )
        .with_delay(Duration::from_millis(1))
        .with_max_ticks(Some(4))
        .run(CancellationToken::new())
        .await;

        let published = sink.published.lock().unwrap();
        assert_eq!(published.len(), 4);
        assert!(published.iter().all(|e| *e == published[0]));
        assert_eq!(published[0].topic, "lab/temp");
    }

    #[tokio::test]
    async fn test_cancellation_stops_worker() {
        let sink = RecordingSink::default();
        let cancel = CancellationToken::new();

        let worker = PollWorker::new(
            &avtech(),
            "test",
            ScriptedReader::repeating(reading(1, 34, "x")),
            sink.clone(),
        )
        .with_delay(Duration::from_millis(5));

        let handle = tokio::spawn(worker.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();

        let stats = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker should stop after cancellation")
            .unwrap();

        assert!(stats.published >= 1);
        assert!(sink.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_target_without_broker_fails() {
        let broker = BrokerConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout_secs: 2,
            ..Default::default()
        };
        let mut target = avtech();
        target.address = "127.0.0.1".to_string();

        let result = run_target(
            target,
            broker,
            ConnectPolicy::default(),
            CancellationToken::new(),
            CancellationToken::new(),
            Some(1),
        )
        .await;

        tokio_test::assert_err!(result);
    }
}
