use std::net::TcpStream;
use std::sync::Arc;

use log::{debug, warn};
use rustls::client::danger::ServerCertVerifier;
use rustls::pki_types::ServerName;
use rustls::{CertificateError, ClientConfig, ClientConnection, StreamOwned};
use url::Url;

use crate::error::{GeminiClientError, Result};
use crate::fingerprint::ssh_encoded_key;
use crate::mask::TrustMask;
use crate::params::Params;
use crate::tofu::{TofuLookup, TofuStore};
use crate::verification::{CapturingVerifier, RecoveryVerifier};

pub type GeminiStream = StreamOwned<ClientConnection, TcpStream>;

/// The three TLS failure classes the recovery ladder knows how to repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryClass {
    SelfSigned,
    LegacyCommonName,
    Expired,
}

/// Host hook invoked the first time a host's capsule key would be pinned.
/// With no host override the reference behavior is to always confirm.
pub trait TofuPrompt: Send + Sync {
    fn confirm(&self, host_port: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct AlwaysConfirm;

impl TofuPrompt for AlwaysConfirm {
    fn confirm(&self, _host_port: &str) -> bool {
        true
    }
}

fn classify(der: &[u8], error: &rustls::Error, host: &str) -> Option<RecoveryClass> {
    match error {
        rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer) => {
            Some(RecoveryClass::SelfSigned)
        }
        rustls::Error::InvalidCertificate(CertificateError::NotValidForName) => {
            common_name_matches(der, host).then_some(RecoveryClass::LegacyCommonName)
        }
        rustls::Error::InvalidCertificate(CertificateError::Expired) => Some(RecoveryClass::Expired),
        _ => None,
    }
}

fn common_name_matches(der: &[u8], host: &str) -> bool {
    let Ok((_, cert)) = x509_parser::parse_x509_certificate(der) else {
        return false;
    };
    cert.subject()
        .iter_common_name()
        .filter_map(|cn| cn.as_str().ok())
        .any(|cn| cn == host)
}

fn class_bits(class: RecoveryClass) -> (TrustMask, TrustMask) {
    match class {
        RecoveryClass::SelfSigned => (TrustMask::ACCEPT_UAE, TrustMask::PROMPT_UAE),
        RecoveryClass::LegacyCommonName => (TrustMask::ACCEPT_LCN, TrustMask::PROMPT_LCN),
        RecoveryClass::Expired => (TrustMask::ACCEPT_CIE, TrustMask::PROMPT_CIE),
    }
}

/// Resolves whether a recoverable failure should be let through, consulting
/// TOFU state and the host's tri-state policy for the failure's class.
/// Accept dominates Prompt dominates Reject within the same class.
fn resolve_decision(
    class: RecoveryClass,
    isv: TrustMask,
    host_port: &str,
    pinned_key: &str,
    store: &TofuStore,
    prompt: &dyn TofuPrompt,
) -> Result<bool> {
    if class == RecoveryClass::Expired {
        // The recovery verify closure never actually tests AcceptCIE or
        // CIEPrompt; extraction happens but the failure stays terminal.
        return Ok(false);
    }

    let (accept, prompt_bit) = class_bits(class);

    if isv.has(accept) {
        return Ok(true);
    }
    if !isv.has(prompt_bit) {
        return Ok(false);
    }

    match store.lookup(host_port, pinned_key)? {
        TofuLookup::Match => Ok(true),
        TofuLookup::AbsentWithWanted => Ok(false),
        TofuLookup::AbsentWithNoneWanted => {
            if prompt.confirm(host_port) {
                store.append(host_port, pinned_key)?;
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }
}

fn build_config(verifier: Arc<dyn ServerCertVerifier>) -> Arc<ClientConfig> {
    Arc::new(
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth(),
    )
}

fn connect(config: &Arc<ClientConfig>, server_name: ServerName<'static>, host_port: &str) -> Result<GeminiStream> {
    let conn = ClientConnection::new(config.clone(), server_name)?;
    let socket = TcpStream::connect(host_port)?;
    Ok(StreamOwned::new(conn, socket))
}

/// Dials `url`'s host over TLS, running the recovery ladder on a
/// recoverable failure before giving up.
pub fn dial(url: &Url, params: &dyn Params, prompt: &dyn TofuPrompt) -> Result<GeminiStream> {
    let host = url
        .host_str()
        .ok_or_else(|| GeminiClientError::Dial("URL has no host".to_string()))?;
    let port = url.port().unwrap_or(1965);
    let host_port = format!("{host}:{port}");
    let server_name = ServerName::try_from(host.to_string())?;

    let capturing = CapturingVerifier::new();
    let standard_config = build_config(capturing.clone());

    match connect(&standard_config, server_name.clone(), &host_port) {
        Ok(stream) => Ok(stream),
        Err(first_err) => {
            debug!("standard TLS dial to {host_port} failed: {first_err}");
            if url.scheme() != "gemini" {
                return Err(first_err);
            }

            let Some((cert, tls_err)) = capturing.take_failure() else {
                return Err(first_err);
            };
            let Some(class) = classify(cert.as_ref(), &tls_err, host) else {
                return Err(first_err);
            };

            let pinned_key = ssh_encoded_key(cert.as_ref());
            let store = TofuStore::new(params.known_hosts());
            let allowed = resolve_decision(class, params.isv(), &host_port, &pinned_key, &store, prompt)?;

            if !allowed {
                warn!("TLS recovery for {host_port} ({class:?}) rejected by policy");
                return Err(GeminiClientError::Dial(format!(
                    "untrusted certificate for {host_port} ({class:?})"
                )));
            }

            debug!("TLS recovery for {host_port} ({class:?}) accepted, redialing");
            let recovery_config = build_config(RecoveryVerifier::new(cert));
            connect(&recovery_config, server_name, &host_port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_class_never_resolves_eligible() {
        let store = TofuStore::new(std::env::temp_dir().join("gemview-test-never-created"));
        let allowed = resolve_decision(
            RecoveryClass::Expired,
            TrustMask::ACCEPT_CIE,
            "example.org:1965",
            "anything",
            &store,
            &AlwaysConfirm,
        )
        .unwrap();
        assert!(!allowed);
    }

    #[test]
    fn accept_bit_dominates_without_consulting_tofu() {
        let store = TofuStore::new(std::env::temp_dir().join("gemview-test-never-created-2"));
        let allowed = resolve_decision(
            RecoveryClass::SelfSigned,
            TrustMask::ACCEPT_UAE,
            "example.org:1965",
            "anything",
            &store,
            &AlwaysConfirm,
        )
        .unwrap();
        assert!(allowed);
    }

    #[test]
    fn neither_bit_set_rejects() {
        let store = TofuStore::new(std::env::temp_dir().join("gemview-test-never-created-3"));
        let allowed = resolve_decision(
            RecoveryClass::LegacyCommonName,
            TrustMask::NONE,
            "example.org:1965",
            "anything",
            &store,
            &AlwaysConfirm,
        )
        .unwrap();
        assert!(!allowed);
    }
}
