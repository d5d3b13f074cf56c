use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};

const KEY_TYPE: &str = "ssh-ed25519";

fn write_ssh_string(out: &mut Vec<u8>, field: &[u8]) {
    out.extend_from_slice(&(field.len() as u32).to_be_bytes());
    out.extend_from_slice(field);
}

/// Computes the known_hosts third field for a presented leaf certificate.
///
/// There is no real Ed25519 key here — a SHA-256 digest of the certificate's
/// DER bytes is wrapped in the same wire format an `ssh-ed25519` public key
/// uses (length-prefixed type tag, length-prefixed 32-byte payload) so that
/// the digest fills the slot a real key's payload would occupy, then
/// base64-encoded exactly as `known_hosts` encodes its third field. Two
/// leaf certificates produce the same string iff their DER bytes hash
/// identically.
pub fn ssh_encoded_key(cert_der: &[u8]) -> String {
    let digest = Sha256::digest(cert_der);

    let mut blob = Vec::with_capacity(4 + KEY_TYPE.len() + 4 + digest.len());
    write_ssh_string(&mut blob, KEY_TYPE.as_bytes());
    write_ssh_string(&mut blob, &digest);

    BASE64.encode(blob)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_der_yields_same_key() {
        let der = b"pretend-certificate-bytes";
        assert_eq!(ssh_encoded_key(der), ssh_encoded_key(der));
    }

    #[test]
    fn different_der_yields_different_key() {
        let a = ssh_encoded_key(b"certificate-one");
        let b = ssh_encoded_key(b"certificate-two");
        assert_ne!(a, b);
    }

    #[test]
    fn encoded_key_has_no_whitespace() {
        let key = ssh_encoded_key(b"anything");
        assert!(!key.contains(' ') && !key.contains('\n'));
    }
}
