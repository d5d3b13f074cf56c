use std::sync::{Arc, Mutex};

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{self, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, DigitallySignedStruct, Error as TlsError, RootCertStore, SignatureScheme};

fn default_roots() -> Arc<RootCertStore> {
    Arc::new(RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    })
}

/// Phase-1 verifier: standard WebPKI validation, but on failure it stashes
/// the offending leaf certificate so the recovery ladder (`dial.rs`) can
/// classify it without rustls's untyped `Error` carrying the cert itself
/// the way Go's `x509.UnknownAuthorityError{Cert: ...}` does.
#[derive(Debug)]
pub struct CapturingVerifier {
    inner: Arc<WebPkiServerVerifier>,
    captured: Mutex<Option<(CertificateDer<'static>, TlsError)>>,
}

impl CapturingVerifier {
    pub fn new() -> Arc<Self> {
        let inner = WebPkiServerVerifier::builder(default_roots())
            .build()
            .expect("default roots always build a valid verifier");
        Arc::new(Self {
            inner,
            captured: Mutex::new(None),
        })
    }

    /// Takes the certificate and error captured by the most recent failed
    /// `verify_server_cert` call, if any.
    pub fn take_failure(&self) -> Option<(CertificateDer<'static>, TlsError)> {
        self.captured.lock().expect("verifier mutex poisoned").take()
    }
}

impl ServerCertVerifier for CapturingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp: &[u8],
        now: UnixTime,
    ) -> Result<danger::ServerCertVerified, TlsError> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp, now)
        {
            Ok(v) => Ok(v),
            Err(e) => {
                *self.captured.lock().expect("verifier mutex poisoned") =
                    Some((end_entity.clone().into_owned(), clone_tls_error(&e)));
                Err(e)
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<danger::HandshakeSignatureValid, TlsError> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<danger::HandshakeSignatureValid, TlsError> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

fn clone_tls_error(e: &TlsError) -> TlsError {
    match e {
        TlsError::InvalidCertificate(ce) => TlsError::InvalidCertificate(clone_cert_error(ce)),
        other => TlsError::General(other.to_string()),
    }
}

fn clone_cert_error(ce: &CertificateError) -> CertificateError {
    match ce {
        CertificateError::UnknownIssuer => CertificateError::UnknownIssuer,
        CertificateError::Expired => CertificateError::Expired,
        CertificateError::NotValidForName => CertificateError::NotValidForName,
        other => CertificateError::Other(rustls::OtherError(Arc::new(std::io::Error::other(
            other.to_string(),
        )))),
    }
}

/// Phase-2 verifier used only after the recovery ladder has already decided
/// (via TOFU match, Accept bit, or a successful prompt) to trust the
/// specific leaf certificate captured during the failed phase-1 handshake.
/// It does not accept certificates in general — it accepts only a
/// byte-for-byte rematch of that one pinned/classified leaf, so a party able
/// to intercept only the recovery redial cannot substitute a different
/// certificate the ladder never evaluated.
#[derive(Debug)]
pub struct RecoveryVerifier {
    expected: CertificateDer<'static>,
}

impl RecoveryVerifier {
    /// `expected` is the leaf certificate extracted from the phase-1
    /// failure (`CapturingVerifier::take_failure`) that `resolve_decision`
    /// was actually evaluated against.
    pub fn new(expected: CertificateDer<'static>) -> Arc<Self> {
        Arc::new(Self { expected })
    }
}

impl ServerCertVerifier for RecoveryVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp: &[u8],
        _now: UnixTime,
    ) -> Result<danger::ServerCertVerified, TlsError> {
        if end_entity.as_ref() != self.expected.as_ref() {
            return Err(TlsError::General(
                "certificate presented on recovery redial does not match the certificate the recovery ladder evaluated".to_string(),
            ));
        }
        Ok(danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<danger::HandshakeSignatureValid, TlsError> {
        Ok(danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<danger::HandshakeSignatureValid, TlsError> {
        Ok(danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
