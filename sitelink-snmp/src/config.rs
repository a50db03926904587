use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SnmpError};

/// Configuration for one SNMP agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpAdapterConfig {
    /// Adapter name (used in logs and status).
    pub name: String,

    /// Agent host name or IP address.
    pub host: String,

    /// Agent UDP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// SNMP version ("v2c" or "v3").
    #[serde(default)]
    pub version: SnmpVersion,

    /// Community string (v2c only).
    #[serde(default = "default_community")]
    pub community: String,

    /// USM settings (required for v3).
    #[serde(default)]
    pub security: Option<SnmpSecurity>,

    /// Vendor table selector: vertiv, schneider, ericsson, nokia,
    /// environment, fiber or all.
    #[serde(default)]
    pub device_type: Option<String>,

    /// Extra OID mappings, applied after the built-in tables.
    #[serde(default)]
    pub custom_mappings: Vec<CustomMapping>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Additional attempts for a batch that times out.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_port() -> u16 {
    161
}

fn default_community() -> String {
    "public".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_retries() -> u32 {
    1
}

/// SNMP protocol version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnmpVersion {
    #[default]
    #[serde(rename = "v2c")]
    V2c,
    #[serde(rename = "v3")]
    V3,
}

/// USM security level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityLevel {
    #[default]
    #[serde(rename = "noAuthNoPriv")]
    NoAuthNoPriv,
    #[serde(rename = "authNoPriv")]
    AuthNoPriv,
    #[serde(rename = "authPriv")]
    AuthPriv,
}

/// SNMPv3 user security settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpSecurity {
    pub username: String,

    #[serde(default)]
    pub security_level: SecurityLevel,

    /// Authentication protocol name (MD5, SHA, SHA224, SHA256, SHA384, SHA512).
    #[serde(default = "default_auth_protocol")]
    pub auth_protocol: String,

    #[serde(default)]
    pub auth_passphrase: Option<String>,

    /// Privacy protocol name (DES, AES, AES192, AES256).
    #[serde(default = "default_priv_protocol")]
    pub priv_protocol: String,

    #[serde(default)]
    pub priv_passphrase: Option<String>,
}

fn default_auth_protocol() -> String {
    "SHA256".to_string()
}

fn default_priv_protocol() -> String {
    "AES256".to_string()
}

/// Authentication algorithm resolved from a protocol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl AuthAlgorithm {
    /// Resolve a protocol name. Unrecognized names fall back to SHA-256.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().replace('-', "").as_str() {
            "MD5" => Self::Md5,
            "SHA" | "SHA1" => Self::Sha1,
            "SHA224" => Self::Sha224,
            "SHA256" => Self::Sha256,
            "SHA384" => Self::Sha384,
            "SHA512" => Self::Sha512,
            other => {
                tracing::warn!(
                    protocol = %other,
                    "Unknown SNMPv3 auth protocol, using SHA256"
                );
                Self::Sha256
            }
        }
    }
}

/// Privacy cipher resolved from a protocol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivAlgorithm {
    Des,
    Aes128,
    Aes192,
    Aes256,
}

impl PrivAlgorithm {
    /// Resolve a protocol name. Unrecognized names fall back to AES-256.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().replace('-', "").as_str() {
            "DES" => Self::Des,
            "AES" | "AES128" => Self::Aes128,
            "AES192" => Self::Aes192,
            "AES256" => Self::Aes256,
            other => {
                tracing::warn!(
                    protocol = %other,
                    "Unknown SNMPv3 privacy protocol, using AES256"
                );
                Self::Aes256
            }
        }
    }
}

impl SnmpSecurity {
    pub fn auth_algorithm(&self) -> AuthAlgorithm {
        AuthAlgorithm::from_name(&self.auth_protocol)
    }

    pub fn priv_algorithm(&self) -> PrivAlgorithm {
        PrivAlgorithm::from_name(&self.priv_protocol)
    }
}

/// A user-supplied OID mapping.
///
/// `metric_type` is a symbolic name; names that do not match a known metric
/// type are dropped when the mapping set is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomMapping {
    pub oid: String,
    pub metric_type: String,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub offset: f32,
    #[serde(default)]
    pub description: String,
}

fn default_scale() -> f32 {
    1.0
}

impl SnmpAdapterConfig {
    /// Minimal v2c configuration with defaults for everything else.
    pub fn v2c(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: default_port(),
            version: SnmpVersion::V2c,
            community: default_community(),
            security: None,
            device_type: None,
            custom_mappings: Vec::new(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
        }
    }

    /// `host:port`, with IPv6 literals bracketed.
    pub fn target(&self) -> String {
        let host = self.host.trim();
        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check mandatory fields.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SnmpError::config("SNMP adapter name cannot be empty"));
        }
        if self.host.trim().is_empty() {
            return Err(SnmpError::config(format!(
                "SNMP adapter '{}' has no host",
                self.name
            )));
        }
        if self.port == 0 {
            return Err(SnmpError::config(format!(
                "SNMP adapter '{}' has an invalid port",
                self.name
            )));
        }
        if self.timeout_ms == 0 {
            return Err(SnmpError::config(format!(
                "SNMP adapter '{}' timeout must be greater than zero",
                self.name
            )));
        }

        if self.version == SnmpVersion::V3 {
            let Some(security) = &self.security else {
                return Err(SnmpError::config(format!(
                    "SNMP adapter '{}' uses SNMPv3 but has no security configuration",
                    self.name
                )));
            };
            security.validate(&self.name)?;
        }

        Ok(())
    }
}

impl SnmpSecurity {
    fn validate(&self, adapter: &str) -> Result<()> {
        if self.username.is_empty() {
            return Err(SnmpError::config(format!(
                "SNMP adapter '{}' has an empty SNMPv3 username",
                adapter
            )));
        }

        let needs_auth = matches!(
            self.security_level,
            SecurityLevel::AuthNoPriv | SecurityLevel::AuthPriv
        );
        if needs_auth && self.auth_passphrase.as_deref().is_none_or(str::is_empty) {
            return Err(SnmpError::config(format!(
                "SNMP adapter '{}' requires an auth passphrase for {:?}",
                adapter, self.security_level
            )));
        }

        if self.security_level == SecurityLevel::AuthPriv
            && self.priv_passphrase.as_deref().is_none_or(str::is_empty)
        {
            return Err(SnmpError::config(format!(
                "SNMP adapter '{}' requires a privacy passphrase for authPriv",
                adapter
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> SnmpAdapterConfig {
        json5::from_str(content).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = parse(r#"{ name: "ups-1", host: "10.0.0.5" }"#);

        assert_eq!(config.port, 161);
        assert_eq!(config.version, SnmpVersion::V2c);
        assert_eq!(config.community, "public");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.custom_mappings.is_empty());
        assert!(config.validate().is_ok());
        assert_eq!(config.target(), "10.0.0.5:161");
    }

    #[test]
    fn test_empty_host_rejected() {
        let config = SnmpAdapterConfig::v2c("ups-1", "  ");
        assert!(matches!(config.validate(), Err(SnmpError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = SnmpAdapterConfig::v2c("ups-1", "10.0.0.5");
        config.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ipv6_target() {
        let config = SnmpAdapterConfig::v2c("ups-1", "fe80::1");
        assert_eq!(config.target(), "[fe80::1]:161");
    }

    #[test]
    fn test_parse_v3_auth_priv() {
        let config = parse(
            r#"{
                name: "rectifier",
                host: "10.0.0.9",
                version: "v3",
                device_type: "vertiv",
                security: {
                    username: "monitor",
                    security_level: "authPriv",
                    auth_protocol: "SHA",
                    auth_passphrase: "authpass123",
                    priv_protocol: "AES",
                    priv_passphrase: "privpass456",
                },
                custom_mappings: [
                    { oid: "1.3.6.1.4.1.476.1.1.1.0", metric_type: "dc_voltage", scale: 0.01 },
                ],
            }"#,
        );

        assert_eq!(config.version, SnmpVersion::V3);
        assert_eq!(config.device_type.as_deref(), Some("vertiv"));
        let security = config.security.as_ref().unwrap();
        assert_eq!(security.security_level, SecurityLevel::AuthPriv);
        assert_eq!(security.auth_algorithm(), AuthAlgorithm::Sha1);
        assert_eq!(security.priv_algorithm(), PrivAlgorithm::Aes128);
        assert_eq!(config.custom_mappings[0].scale, 0.01);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_v3_requires_security() {
        let mut config = SnmpAdapterConfig::v2c("ups-1", "10.0.0.5");
        config.version = SnmpVersion::V3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_security_levels_require_passphrases() {
        let mut config = SnmpAdapterConfig::v2c("ups-1", "10.0.0.5");
        config.version = SnmpVersion::V3;
        config.security = Some(SnmpSecurity {
            username: "monitor".into(),
            security_level: SecurityLevel::NoAuthNoPriv,
            auth_protocol: default_auth_protocol(),
            auth_passphrase: None,
            priv_protocol: default_priv_protocol(),
            priv_passphrase: None,
        });
        assert!(config.validate().is_ok());

        config.security.as_mut().unwrap().security_level = SecurityLevel::AuthNoPriv;
        assert!(config.validate().is_err());

        config.security.as_mut().unwrap().auth_passphrase = Some("authpass123".into());
        assert!(config.validate().is_ok());

        config.security.as_mut().unwrap().security_level = SecurityLevel::AuthPriv;
        assert!(config.validate().is_err());

        config.security.as_mut().unwrap().priv_passphrase = Some("privpass456".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_protocols_fall_back_to_strong_defaults() {
        assert_eq!(AuthAlgorithm::from_name("WHIRLPOOL"), AuthAlgorithm::Sha256);
        assert_eq!(AuthAlgorithm::from_name(""), AuthAlgorithm::Sha256);
        assert_eq!(PrivAlgorithm::from_name("3DES-EDE"), PrivAlgorithm::Aes256);
        assert_eq!(PrivAlgorithm::from_name("aes-192"), PrivAlgorithm::Aes192);
        assert_eq!(AuthAlgorithm::from_name("sha-512"), AuthAlgorithm::Sha512);
    }
}
