//! Certificate trust configuration for outbound calls.
//!
//! Two knobs exist:
//!
//! - extra root certificates, configured once on the transport
//!   ([`TransportConfig`](crate::http::TransportConfig));
//! - a per-request [`TrustPolicy`], attached by the
//!   [`RequestBuilder`](crate::http::RequestBuilder).
//!
//! Standard validation is the default. Accepting any certificate must be asked
//! for by name.
//!
//! ```ignore
//! use pinlane_net::tls::{Certificate, TrustPolicy};
//!
//! let ca_cert = Certificate::from_pem_file("/path/to/ca.crt")?;
//! let transport = ReqwestTransport::builder()
//!     .add_root_certificate(ca_cert)
//!     .build()?;
//!
//! let spec = RequestBuilder::new()
//!     .url("https://staging.internal/pin")
//!     .trust_policy(TrustPolicy::DangerAcceptInvalidCerts)
//!     .build()?;
//! ```

use std::io::{BufReader, Cursor};
use std::path::Path;

use rustls_pki_types::CertificateDer;

use crate::error::{NetError, Result};

/// Certificate validation strategy for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustPolicy {
    /// Validate the server certificate chain and hostname.
    #[default]
    Verify,
    /// Accept any certificate the server presents.
    ///
    /// # Warning
    ///
    /// This disables certificate verification and makes the connection
    /// vulnerable to man-in-the-middle attacks.
    DangerAcceptInvalidCerts,
}

impl TrustPolicy {
    /// Returns `true` for the relaxed policy.
    pub fn is_relaxed(self) -> bool {
        matches!(self, Self::DangerAcceptInvalidCerts)
    }
}

/// A TLS certificate to add to the trust store.
#[derive(Clone)]
pub struct Certificate {
    der_certs: Vec<CertificateDer<'static>>,
}

impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("cert_count", &self.der_certs.len())
            .finish()
    }
}

impl Certificate {
    /// Load a certificate from PEM-encoded bytes.
    ///
    /// This can contain multiple certificates (a certificate chain).
    pub fn from_pem(pem_data: impl AsRef<[u8]>) -> Result<Self> {
        let mut reader = BufReader::new(Cursor::new(pem_data.as_ref()));
        let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| NetError::Tls(format!("Failed to parse PEM certificate: {e}")))?;

        if certs.is_empty() {
            return Err(NetError::Tls("No certificates found in PEM data".to_string()));
        }

        Ok(Self { der_certs: certs })
    }

    /// Load a certificate from a PEM-encoded file.
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let pem_data = std::fs::read(path.as_ref()).map_err(|e| {
            NetError::Tls(format!(
                "Failed to read certificate file '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_pem(pem_data)
    }

    /// Load a certificate from DER-encoded bytes.
    pub fn from_der(der_data: impl Into<Vec<u8>>) -> Self {
        Self {
            der_certs: vec![CertificateDer::from(der_data.into())],
        }
    }

    /// Number of DER certificates held.
    pub fn len(&self) -> usize {
        self.der_certs.len()
    }

    /// Whether no certificate is held. Never true for a successfully parsed PEM.
    pub fn is_empty(&self) -> bool {
        self.der_certs.is_empty()
    }

    /// Convert to reqwest certificates for use with the HTTP client.
    pub(crate) fn to_reqwest_certificates(&self) -> Vec<reqwest::Certificate> {
        self.der_certs
            .iter()
            .filter_map(|cert| reqwest::Certificate::from_der(cert.as_ref()).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_policy_default_verifies() {
        assert_eq!(TrustPolicy::default(), TrustPolicy::Verify);
        assert!(!TrustPolicy::Verify.is_relaxed());
        assert!(TrustPolicy::DangerAcceptInvalidCerts.is_relaxed());
    }

    #[test]
    fn test_certificate_from_pem() {
        let pem = r#"-----BEGIN CERTIFICATE-----
MIIBkTCB+wIJAKHBfpegE3jEMA0GCSqGSIb3DQEBCwUAMBExDzANBgNVBAMMBnRl
c3RjYTAeFw0yMzAxMDEwMDAwMDBaFw0yNDAxMDEwMDAwMDBaMBExDzANBgNVBAMM
BnRlc3RjYTBcMA0GCSqGSIb3DQEBAQUAA0sAMEgCQQC7o96HtiK7onnPevKSE2LL
oSXwnmfYwZPV2bvfGS18lK8F+DL+42IjT3ucMXnLBhzNCLNKE8yCVK6LPlsvpNlX
AgMBAAGjUzBRMB0GA1UdDgQWBBQgHGHqPcVi1N4CG7IxDJaFMvP6XTAfBgNVHSME
GDAWgBQgHGHqPcVi1N4CG7IxDJaFMvP6XTAPBgNVHRMBAf8EBTADAQH/MA0GCSqG
SIb3DQEBCwUAA0EAGLJHfg9dS/T39L6VQLJeZcpH7mY8vKaM9dM/Zn3HMhfc0Yjv
3hxMPmPGjjpQ9JKaLI0Rq7n5oEUP+xluoAAfrQ==
-----END CERTIFICATE-----"#;

        let cert = Certificate::from_pem(pem).unwrap();
        assert_eq!(cert.len(), 1);
    }

    #[test]
    fn test_certificate_from_pem_without_blocks_fails() {
        let result = Certificate::from_pem("not a certificate");
        assert!(matches!(result, Err(NetError::Tls(_))));
    }

    #[test]
    fn test_certificate_from_der() {
        let der = vec![0x30, 0x03, 0x02, 0x01, 0x00];
        let cert = Certificate::from_der(der);
        assert_eq!(cert.len(), 1);
        assert!(!cert.is_empty());
    }
}
