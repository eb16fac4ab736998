//! Confidentiality seam for session payloads.

/// Symmetric encryption supplied by the host.
///
/// Implementations return `None` on any failure; the engine never sees
/// partial output.
pub trait ConfidentialityCodec {
    fn encrypt(&self, plaintext: &str, key: &str) -> Option<String>;

    fn decrypt(&self, ciphertext: &str, key: &str) -> Option<String>;
}
