//! Outbound TLS policy for the SAP Service Layer.
//!
//! Some Service Layer installations still sit behind old TLS stacks, so the
//! minimum protocol version and certificate validation are site settings:
//!
//! - `SAP_TLS_MIN_VERSION`: `1.0`, `1.1`, `1.2` or `1.3` (unset = client default)
//! - `SAP_TLS_ACCEPT_INVALID_CERTS`: accept self-signed / mismatched certificates
//!
//! Cipher suites are left to the TLS backend.

use anyhow::{bail, Result};
use std::str::FromStr;

use super::parse_bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMinVersion {
    Tls10,
    Tls11,
    Tls12,
    Tls13,
}

impl TlsMinVersion {
    fn as_reqwest(self) -> reqwest::tls::Version {
        match self {
            TlsMinVersion::Tls10 => reqwest::tls::Version::TLS_1_0,
            TlsMinVersion::Tls11 => reqwest::tls::Version::TLS_1_1,
            TlsMinVersion::Tls12 => reqwest::tls::Version::TLS_1_2,
            TlsMinVersion::Tls13 => reqwest::tls::Version::TLS_1_3,
        }
    }
}

impl FromStr for TlsMinVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        let version = normalized
            .trim_start_matches("tlsv")
            .trim_start_matches("tls")
            .trim_start_matches(['v', '_', ' '])
            .replace('_', ".");

        match version.as_str() {
            "1" | "1.0" => Ok(TlsMinVersion::Tls10),
            "1.1" => Ok(TlsMinVersion::Tls11),
            "1.2" => Ok(TlsMinVersion::Tls12),
            "1.3" => Ok(TlsMinVersion::Tls13),
            _ => bail!("Unsupported TLS version '{}'", s),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientTlsConfig {
    pub min_version: Option<TlsMinVersion>,
    pub accept_invalid_certs: bool,
}

impl ClientTlsConfig {
    /// Read the policy through `lookup` (normally `std::env::var`).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let min_version = match lookup("SAP_TLS_MIN_VERSION") {
            Some(raw) if !raw.trim().is_empty() => Some(raw.parse()?),
            _ => None,
        };

        let accept_invalid_certs = lookup("SAP_TLS_ACCEPT_INVALID_CERTS")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(false);

        Ok(Self {
            min_version,
            accept_invalid_certs,
        })
    }

    pub fn apply(&self, builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
        let mut builder = builder.danger_accept_invalid_certs(self.accept_invalid_certs);
        if let Some(version) = self.min_version {
            builder = builder.min_tls_version(version.as_reqwest());
        }

        if self.accept_invalid_certs {
            tracing::warn!("⚠️  SAP Service Layer certificate validation is DISABLED");
        }

        builder
    }
}
