//! Publish sinks for MQTT and Zenoh.
//!
//! A worker owns exactly one sink. Sinks accept an [`Envelope`] (topic plus
//! serialized payload) and return once the payload has been handed to the
//! broker client. MQTT publishes use QoS "at most once" without retain, so a
//! completed publish means local send completion, not delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mibridge_common::{BrokerConfig, BrokerKind, open_zenoh};

use crate::error::{BridgeError, Result};

/// A serialized record addressed to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// Destination for serialized records.
#[async_trait]
pub trait PublishSink: Send + Sync {
    /// Publish one envelope and wait for local send completion.
    async fn publish(&self, envelope: &Envelope) -> Result<()>;

    /// Release the underlying connection.
    async fn close(&self) {}
}

/// Connection lifecycle callbacks, supplied per connection.
pub trait LifecycleHooks: Send + Sync {
    /// The broker accepted the connection (initially or after a reconnect).
    fn on_connect(&self, client_id: &str);

    /// The connection dropped.
    fn on_connection_lost(&self, client_id: &str, error: &str);
}

/// Hooks that only log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHooks;

impl LifecycleHooks for LoggingHooks {
    fn on_connect(&self, client_id: &str) {
        tracing::info!(client_id = %client_id, "Connected to broker");
    }

    fn on_connection_lost(&self, client_id: &str, error: &str) {
        tracing::warn!(client_id = %client_id, error = %error, "Broker connection lost");
    }
}

/// Upper bound for flushing DISCONNECT on close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection state shared with the event loop task.
#[derive(Debug, Default)]
struct LinkState {
    connected: AtomicBool,
    closing: AtomicBool,
}

/// MQTT publisher backed by `rumqttc`.
///
/// The client event loop runs in its own task for the lifetime of the
/// publisher. After a connection loss the loop waits `reconnect_delay_ms`
/// and polls again, which makes the client reconnect. Publishes issued while
/// the connection is down are refused, so readings from an outage are
/// dropped rather than replayed after the reconnect.
#[derive(Debug)]
pub struct MqttPublisher {
    client: AsyncClient,
    client_id: String,
    publish_timeout: Duration,
    link: Arc<LinkState>,
    event_loop: JoinHandle<()>,
    /// Cancelled when the event loop task exits.
    stopped: CancellationToken,
    stop: CancellationToken,
}

impl MqttPublisher {
    /// Connect to the broker and wait for its CONNACK.
    pub async fn connect(
        config: &BrokerConfig,
        client_id: &str,
        hooks: Arc<dyn LifecycleHooks>,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        options.set_clean_session(true);
        if let Some(username) = &config.username {
            options.set_credentials(
                username.clone(),
                config.password.clone().unwrap_or_default(),
            );
        }

        tracing::info!(
            client_id = %client_id,
            host = %config.host,
            port = config.port,
            "Connecting to MQTT broker"
        );

        let (client, event_loop) = AsyncClient::new(options, 16);
        let (ready_tx, ready_rx) = oneshot::channel();
        let stop = cancel.child_token();
        let stopped = CancellationToken::new();
        let link = Arc::new(LinkState::default());

        let event_loop = tokio::spawn(drive_event_loop(
            EventLoopTask {
                client_id: client_id.to_string(),
                hooks,
                reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
                link: link.clone(),
                stop: stop.clone(),
                stopped: stopped.clone(),
            },
            event_loop,
            ready_tx,
        ));

        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(BridgeError::Connect {
                client_id: client_id.to_string(),
                message: "cancelled".to_string(),
            }),
            ready = tokio::time::timeout(connect_timeout, ready_rx) => match ready {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(message))) => Err(BridgeError::Connect {
                    client_id: client_id.to_string(),
                    message,
                }),
                Ok(Err(_)) => Err(BridgeError::Connect {
                    client_id: client_id.to_string(),
                    message: "event loop stopped".to_string(),
                }),
                Err(_) => Err(BridgeError::ConnectTimeout {
                    client_id: client_id.to_string(),
                }),
            },
        };

        if let Err(e) = outcome {
            stop.cancel();
            event_loop.abort();
            return Err(e);
        }

        Ok(Self {
            client,
            client_id: client_id.to_string(),
            publish_timeout: Duration::from_millis(config.publish_timeout_ms),
            link,
            event_loop,
            stopped,
            stop,
        })
    }

    /// Whether the broker connection is currently up.
    pub fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublishSink for MqttPublisher {
    async fn publish(&self, envelope: &Envelope) -> Result<()> {
        if !self.is_connected() {
            return Err(BridgeError::Publish {
                topic: envelope.topic.clone(),
                message: "not connected".to_string(),
            });
        }

        let send = self.client.publish(
            envelope.topic.clone(),
            QoS::AtMostOnce,
            false,
            envelope.payload.clone(),
        );

        match tokio::time::timeout(self.publish_timeout, send).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BridgeError::Publish {
                topic: envelope.topic.clone(),
                message: e.to_string(),
            }),
            Err(_) => Err(BridgeError::PublishTimeout {
                topic: envelope.topic.clone(),
            }),
        }
    }

    async fn close(&self) {
        self.link.closing.store(true, Ordering::SeqCst);

        if self.link.connected.swap(false, Ordering::SeqCst) {
            match self.client.try_disconnect() {
                // The event loop exits once DISCONNECT is on the wire.
                Ok(()) => {
                    if tokio::time::timeout(CLOSE_TIMEOUT, self.stopped.cancelled())
                        .await
                        .is_err()
                    {
                        tracing::debug!(
                            client_id = %self.client_id,
                            "MQTT disconnect not flushed in time"
                        );
                    }
                }
                Err(e) => tracing::debug!(
                    client_id = %self.client_id,
                    error = %e,
                    "MQTT disconnect failed"
                ),
            }
        }

        self.stop.cancel();
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.stop.cancel();
        self.event_loop.abort();
    }
}

struct EventLoopTask {
    client_id: String,
    hooks: Arc<dyn LifecycleHooks>,
    reconnect_delay: Duration,
    link: Arc<LinkState>,
    stop: CancellationToken,
    stopped: CancellationToken,
}

async fn drive_event_loop(
    task: EventLoopTask,
    mut event_loop: EventLoop,
    ready: oneshot::Sender<std::result::Result<(), String>>,
) {
    let EventLoopTask {
        client_id,
        hooks,
        reconnect_delay,
        link,
        stop,
        stopped,
    } = task;
    let _stopped = stopped.drop_guard();
    let mut ready = Some(ready);

    loop {
        let event = tokio::select! {
            _ = stop.cancelled() => break,
            event = event_loop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                link.connected.store(true, Ordering::SeqCst);
                hooks.on_connect(&client_id);
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(e) => {
                link.connected.store(false, Ordering::SeqCst);

                // The first failure is reported to `connect` instead of the hooks.
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(e.to_string()));
                    break;
                }
                if link.closing.load(Ordering::SeqCst) {
                    break;
                }

                hooks.on_connection_lost(&client_id, &e.to_string());

                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(reconnect_delay) => {}
                }
            }
        }
    }

    tracing::debug!(client_id = %client_id, "MQTT event loop stopped");
}

/// Zenoh publisher; topics are used as key expressions.
#[derive(Debug)]
pub struct ZenohPublisher {
    session: zenoh::Session,
}

impl ZenohPublisher {
    /// Open a dedicated Zenoh session.
    pub async fn connect(
        config: &BrokerConfig,
        client_id: &str,
        hooks: Arc<dyn LifecycleHooks>,
    ) -> Result<Self> {
        let session = open_zenoh(&config.zenoh)
            .await
            .map_err(|e| BridgeError::Connect {
                client_id: client_id.to_string(),
                message: e.to_string(),
            })?;

        hooks.on_connect(client_id);

        Ok(Self { session })
    }
}

#[async_trait]
impl PublishSink for ZenohPublisher {
    async fn publish(&self, envelope: &Envelope) -> Result<()> {
        self.session
            .put(&envelope.topic, envelope.payload.clone())
            .await
            .map_err(|e| BridgeError::Publish {
                topic: envelope.topic.clone(),
                message: e.to_string(),
            })
    }

    async fn close(&self) {
        if let Err(e) = self.session.close().await {
            tracing::warn!(error = %e, "Error closing Zenoh session");
        }
    }
}

/// A sink selected by [`BrokerConfig::kind`].
#[derive(Debug)]
pub enum Publisher {
    Mqtt(MqttPublisher),
    Zenoh(ZenohPublisher),
}

impl Publisher {
    /// Open the sink configured in `config`.
    pub async fn connect(
        config: &BrokerConfig,
        client_id: &str,
        hooks: Arc<dyn LifecycleHooks>,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        match config.kind {
            BrokerKind::Mqtt => Ok(Self::Mqtt(
                MqttPublisher::connect(config, client_id, hooks, cancel).await?,
            )),
            BrokerKind::Zenoh => Ok(Self::Zenoh(
                ZenohPublisher::connect(config, client_id, hooks).await?,
            )),
        }
    }
}

#[async_trait]
impl PublishSink for Publisher {
    async fn publish(&self, envelope: &Envelope) -> Result<()> {
        match self {
            Self::Mqtt(sink) => sink.publish(envelope).await,
            Self::Zenoh(sink) => sink.publish(envelope).await,
        }
    }

    async fn close(&self) {
        match self {
            Self::Mqtt(sink) => sink.close().await,
            Self::Zenoh(sink) => sink.close().await,
        }
    }
}
