//! SNMP GET client seam and the snmp2-backed implementation.

use std::time::Duration;

use async_trait::async_trait;
use snmp2::{AsyncSession, Value, v3};
use tokio::time::timeout;

use crate::config::{AuthAlgorithm, PrivAlgorithm, SecurityLevel, SnmpAdapterConfig, SnmpVersion};
use crate::error::{Result, SnmpError};
use crate::oid::{oid_to_string, parse_oid};

/// An owned SNMP varbind value.
#[derive(Debug, Clone, PartialEq)]
pub enum PduValue {
    Integer(i64),
    Counter32(u32),
    Unsigned32(u32),
    Timeticks(u32),
    Counter64(u64),
    OctetString(Vec<u8>),
    Null,
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    /// Anything else (OIDs, IP addresses, opaque data).
    Other,
}

impl PduValue {
    pub fn from_snmp(value: &Value) -> Self {
        match value {
            Value::Integer(n) => PduValue::Integer(*n),
            Value::Counter32(n) => PduValue::Counter32(*n),
            Value::Unsigned32(n) => PduValue::Unsigned32(*n),
            Value::Timeticks(n) => PduValue::Timeticks(*n),
            Value::Counter64(n) => PduValue::Counter64(*n),
            Value::OctetString(s) => PduValue::OctetString(s.to_vec()),
            Value::Null => PduValue::Null,
            Value::NoSuchObject => PduValue::NoSuchObject,
            Value::NoSuchInstance => PduValue::NoSuchInstance,
            Value::EndOfMibView => PduValue::EndOfMibView,
            _ => PduValue::Other,
        }
    }

    /// True for the markers an agent returns instead of a value.
    pub fn is_error_marker(&self) -> bool {
        matches!(
            self,
            PduValue::Null
                | PduValue::NoSuchObject
                | PduValue::NoSuchInstance
                | PduValue::EndOfMibView
        )
    }

    /// Numeric reading of the value.
    ///
    /// Octet strings are parsed as decimal text and read as 0 when they are
    /// not numbers. Error markers and non-numeric types give `None`.
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            PduValue::Integer(n) => Some(*n as f32),
            PduValue::Counter32(n) | PduValue::Unsigned32(n) | PduValue::Timeticks(n) => {
                Some(*n as f32)
            }
            PduValue::Counter64(n) => Some(*n as f32),
            PduValue::OctetString(bytes) => Some(
                std::str::from_utf8(bytes)
                    .ok()
                    .and_then(|s| s.trim().parse::<f32>().ok())
                    .unwrap_or(0.0),
            ),
            _ => None,
        }
    }
}

/// Issues SNMP GET requests.
#[async_trait]
pub trait SnmpClient: Send {
    /// GET the given OIDs in one request. Returns `(oid, value)` pairs with
    /// normalized OIDs.
    async fn get(&mut self, oids: &[String]) -> Result<Vec<(String, PduValue)>>;
}

/// [`SnmpClient`] over an snmp2 UDP session.
pub struct SessionClient {
    session: AsyncSession,
    target: String,
    request_timeout: Duration,
    retries: u32,
}

impl SessionClient {
    /// Open a session for the configured version. SNMPv3 sessions also run
    /// engine discovery here.
    pub async fn open(config: &SnmpAdapterConfig) -> Result<Self> {
        let target = config.target();
        let session_error = |reason: String| SnmpError::Session {
            target: target.clone(),
            reason,
        };

        let session = match config.version {
            SnmpVersion::V2c => AsyncSession::new_v2c(&target, config.community.as_bytes(), 0)
                .await
                .map_err(|e| session_error(e.to_string()))?,
            SnmpVersion::V3 => {
                let security = config.security.as_ref().ok_or_else(|| {
                    SnmpError::config(format!(
                        "SNMP adapter '{}' uses SNMPv3 but has no security configuration",
                        config.name
                    ))
                })?;

                let auth_password = security.auth_passphrase.clone().unwrap_or_default();
                let auth = match security.security_level {
                    SecurityLevel::NoAuthNoPriv => v3::Auth::NoAuthNoPriv,
                    SecurityLevel::AuthNoPriv => v3::Auth::AuthNoPriv,
                    SecurityLevel::AuthPriv => v3::Auth::AuthPriv {
                        cipher: cipher(security.priv_algorithm()),
                        privacy_password: security
                            .priv_passphrase
                            .clone()
                            .unwrap_or_default()
                            .into_bytes(),
                    },
                };

                let usm = v3::Security::new(security.username.as_bytes(), auth_password.as_bytes())
                    .with_auth_protocol(auth_protocol(security.auth_algorithm()))
                    .with_auth(auth);

                let mut session = AsyncSession::new_v3(&target, 0, usm)
                    .await
                    .map_err(|e| session_error(e.to_string()))?;

                timeout(config.timeout(), session.init())
                    .await
                    .map_err(|_| SnmpError::Timeout(config.timeout()))?
                    .map_err(|e| session_error(format!("engine discovery failed: {}", e)))?;

                session
            }
        };

        Ok(Self {
            session,
            target,
            request_timeout: config.timeout(),
            retries: config.retries,
        })
    }
}

#[async_trait]
impl SnmpClient for SessionClient {
    async fn get(&mut self, oids: &[String]) -> Result<Vec<(String, PduValue)>> {
        let parsed = oids
            .iter()
            .map(|o| parse_oid(o))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&snmp2::Oid> = parsed.iter().collect();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match timeout(self.request_timeout, self.session.get_many(&refs)).await {
                Ok(Ok(response)) => {
                    if response.error_status != 0 {
                        return Err(SnmpError::Request(format!(
                            "agent {} returned error status {} (index {})",
                            self.target, response.error_status, response.error_index
                        )));
                    }
                    return Ok(response
                        .varbinds
                        .map(|(oid, value)| (oid_to_string(&oid), PduValue::from_snmp(&value)))
                        .collect());
                }
                Ok(Err(e)) => {
                    return Err(SnmpError::Request(format!("{}: {}", self.target, e)));
                }
                Err(_) if attempt <= self.retries => {
                    tracing::debug!(
                        agent = %self.target,
                        attempt,
                        "SNMP GET timed out, retrying"
                    );
                }
                Err(_) => return Err(SnmpError::Timeout(self.request_timeout)),
            }
        }
    }
}

fn auth_protocol(algorithm: AuthAlgorithm) -> v3::AuthProtocol {
    match algorithm {
        AuthAlgorithm::Md5 => v3::AuthProtocol::Md5,
        AuthAlgorithm::Sha1 => v3::AuthProtocol::Sha1,
        AuthAlgorithm::Sha224 => v3::AuthProtocol::Sha224,
        AuthAlgorithm::Sha256 => v3::AuthProtocol::Sha256,
        AuthAlgorithm::Sha384 => v3::AuthProtocol::Sha384,
        AuthAlgorithm::Sha512 => v3::AuthProtocol::Sha512,
    }
}

fn cipher(algorithm: PrivAlgorithm) -> v3::Cipher {
    match algorithm {
        PrivAlgorithm::Des => v3::Cipher::Des,
        PrivAlgorithm::Aes128 => v3::Cipher::Aes128,
        PrivAlgorithm::Aes192 => v3::Cipher::Aes192,
        PrivAlgorithm::Aes256 => v3::Cipher::Aes256,
    }
}
