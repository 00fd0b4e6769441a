//! Packet obfuscation transforms for the tunnel transport.
//!
//! A transform contributes extra on-wire bytes around each tunnel datagram.
//! `obfuscated_len` bytes are produced on send and stripped again on
//! receive; `deobfuscated_len` says how many of the stripped bytes carry
//! payload that must be restored (for header-only transforms, none).

mod counter;

pub use counter::CounterObfuscator;

pub trait Obfuscator: Send + Sync {
    /// Write the transform's bytes for one outgoing packet into `dst`.
    /// `dst` is exactly `obfuscated_len(src.len())` bytes. Transform-local
    /// state may advance; nothing else is touched.
    fn obfuscate(&self, dst: &mut [u8], src: &[u8]);

    /// Reverse the transform for one incoming packet. Returns whether `src`
    /// was accepted; on acceptance, `dst` holds `deobfuscated_len(src.len())`
    /// restored payload bytes.
    fn deobfuscate(&self, dst: &mut [u8], src: &[u8]) -> bool;

    /// Bytes this transform adds to a packet with `payload_len` payload
    /// bytes.
    fn obfuscated_len(&self, payload_len: usize) -> usize;

    /// Payload bytes this transform restores on the decode side.
    fn deobfuscated_len(&self, payload_len: usize) -> usize;
}

/// Select a transform by its configuration tag. Each tunnel session gets its
/// own instance; transform state is never shared across sessions.
pub fn new_obfuscator(tag: &str) -> std::io::Result<Box<dyn Obfuscator>> {
    match tag {
        "counter" | "c" => Ok(Box::new(CounterObfuscator::new())),
        _ => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("unknown obfuscation transform: {tag}"),
        )),
    }
}
