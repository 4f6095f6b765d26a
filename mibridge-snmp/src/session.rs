//! SNMP sessions and the sample reader seam used by workers.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigInt;
use snmp2::{AsyncSession, Oid, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{ConnectPolicy, SnmpVersion, TargetConfig};
use crate::oid::{OidParseError, oid_to_string, parse_oids};
use crate::sample::{RawSample, SampleValue, Varbind};

/// Errors raised while opening or polling an SNMP session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Oid(#[from] OidParseError),

    #[error("Failed to open SNMP session to '{address}': {message}")]
    Open { address: String, message: String },

    #[error("SNMP request to '{address}' timed out after {timeout_ms}ms")]
    Timeout { address: String, timeout_ms: u64 },

    #[error("SNMP request to '{address}' failed: {message}")]
    Request { address: String, message: String },

    #[error("Agent '{address}' returned error status {status} at index {index}")]
    Agent {
        address: String,
        status: u32,
        index: u32,
    },

    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<SessionError>,
    },

    #[error("Cancelled")]
    Cancelled,
}

impl SessionError {
    /// Whether another attempt could succeed.
    ///
    /// Bad OIDs and agent-side errors repeat on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Open { .. } | SessionError::Timeout { .. } | SessionError::Request { .. }
        )
    }
}

/// Source of raw samples for a worker.
#[async_trait]
pub trait SampleReader: Send {
    /// Read every configured OID once, in configuration order.
    async fn poll(&mut self) -> Result<RawSample, SessionError>;
}

/// An open SNMP session bound to one target.
pub struct SnmpSession {
    name: String,
    address: String,
    // Boxed: the session carries a large receive buffer.
    session: Box<AsyncSession>,
    oids: Vec<Oid<'static>>,
    timeout: Duration,
    retries: u32,
}

impl std::fmt::Debug for SnmpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnmpSession")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("oids", &self.oids.len())
            .finish()
    }
}

impl SnmpSession {
    /// Open a session with a single attempt.
    pub async fn open(target: &TargetConfig) -> Result<Self, SessionError> {
        let oids = parse_oids(&target.oids)?;
        let address = target.socket_address();

        if target.address.is_empty() {
            return Err(SessionError::Open {
                address,
                message: "no address configured".to_string(),
            });
        }

        let timeout = target.request_timeout();
        let community = target.community.as_bytes();

        let opening = Box::pin(async {
            let session = match target.version {
                SnmpVersion::V1 => AsyncSession::new_v1(address.as_str(), community, 0).await,
                SnmpVersion::V2c => AsyncSession::new_v2c(address.as_str(), community, 0).await,
            };
            session.map(Box::new)
        });

        let session = tokio::time::timeout(timeout, opening)
            .await
            .map_err(|_| SessionError::Timeout {
                address: address.clone(),
                timeout_ms: target.timeout_ms,
            })?
            .map_err(|e| SessionError::Open {
                address: address.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!(device = %target.name, address = %address, "SNMP session opened");

        Ok(Self {
            name: target.name.clone(),
            address,
            session,
            oids,
            timeout,
            retries: target.retries,
        })
    }

    /// Open a session, retrying with backoff according to `policy`.
    pub async fn connect(
        target: &TargetConfig,
        policy: &ConnectPolicy,
        cancel: &CancellationToken,
    ) -> Result<Self, SessionError> {
        retry_with_backoff(policy, cancel, &target.name, || Box::pin(Self::open(target))).await
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn get_once(&mut self) -> Result<RawSample, SessionError> {
        let oids: Vec<&Oid> = self.oids.iter().collect();

        let response = tokio::time::timeout(self.timeout, self.session.get_many(&oids))
            .await
            .map_err(|_| SessionError::Timeout {
                address: self.address.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| SessionError::Request {
                address: self.address.clone(),
                message: e.to_string(),
            })?;

        if response.error_status != 0 {
            return Err(SessionError::Agent {
                address: self.address.clone(),
                status: response.error_status,
                index: response.error_index,
            });
        }

        let varbinds = response
            .varbinds
            .map(|(oid, value)| Varbind::new(oid_to_string(&oid), sample_value(&value)))
            .collect();

        Ok(RawSample::new(varbinds))
    }
}

#[async_trait]
impl SampleReader for SnmpSession {
    async fn poll(&mut self) -> Result<RawSample, SessionError> {
        let mut attempt = 0;
        loop {
            match self.get_once().await {
                Ok(sample) => return Ok(sample),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    tracing::debug!(
                        device = %self.name,
                        attempt,
                        error = %e,
                        "Retrying SNMP request"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Run `op` until it succeeds, the policy runs out of attempts, or `cancel` fires.
///
/// Non-retryable errors are returned immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &ConnectPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> Result<T, SessionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SessionError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            result = op() => result,
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        if attempt >= max_attempts {
            return Err(SessionError::Exhausted {
                attempts: attempt,
                last: Box::new(error),
            });
        }

        let delay = policy.backoff(attempt);
        tracing::warn!(
            device = %label,
            attempt,
            max_attempts,
            retry_in_ms = delay.as_millis() as u64,
            error = %error,
            "Connection attempt failed"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Reduce an SNMP value to the shapes the decoders read.
fn sample_value(value: &Value) -> SampleValue {
    match value {
        Value::Integer(n) => SampleValue::Integer(BigInt::from(*n)),
        Value::OctetString(bytes) => SampleValue::OctetString(bytes.to_vec()),
        Value::Counter32(n) | Value::Unsigned32(n) | Value::Timeticks(n) => {
            SampleValue::Integer(BigInt::from(*n))
        }
        Value::Counter64(n) => SampleValue::Integer(BigInt::from(*n)),
        _ => SampleValue::Null,
    }
}
