//! Inbound datagram decoding.
//!
//! Datagrams arrive in one of two encodings:
//! - ASCII: any datagram not starting with the marker is forwarded
//!   byte-for-byte.
//! - Hex: one or more leading `\b` markers followed by a hex string,
//!   decoded to raw bytes before forwarding.

use thiserror::Error;

/// Two-byte prefix selecting hex payload encoding (literal backslash + 'b').
pub const HEX_MARKER: &[u8] = br"\b";

/// Maximum bytes read from a single inbound datagram. Longer datagrams are
/// truncated by the receive call, not rejected.
pub const MAX_DATAGRAM_LEN: usize = 64;

/// Decode errors.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Marker-prefixed payload is not a valid hex string (odd length or
    /// non-hex characters).
    #[error("malformed hex payload: {0}")]
    MalformedHexPayload(#[from] hex::FromHexError),
}

/// Decode a raw datagram into the payload to forward.
///
/// Datagrams without the marker prefix pass through unchanged. Datagrams
/// with the prefix have every leading marker occurrence stripped and the
/// remainder hex-decoded.
pub fn decode(msg: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if !msg.starts_with(HEX_MARKER) {
        return Ok(msg.to_vec());
    }

    let mut rest = msg;
    while rest.starts_with(HEX_MARKER) {
        rest = &rest[HEX_MARKER.len()..];
    }

    Ok(hex::decode(rest)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through_unchanged() {
        assert_eq!(decode(b"hello").unwrap(), b"hello");
        assert_eq!(decode(b"").unwrap(), b"");
        // Marker bytes later in the payload are not special.
        assert_eq!(decode(b"go \\b cue").unwrap(), b"go \\b cue");
    }

    #[test]
    fn marker_selects_hex_decoding() {
        assert_eq!(decode(b"\\bff00").unwrap(), vec![0xFF, 0x00]);
        assert_eq!(decode(b"\\b2f731001").unwrap(), vec![0x2F, 0x73, 0x10, 0x01]);
    }

    #[test]
    fn repeated_leading_markers_are_all_stripped() {
        assert_eq!(decode(b"\\b\\b\\bff00").unwrap(), vec![0xFF, 0x00]);
    }

    #[test]
    fn marker_with_empty_remainder_decodes_to_empty_payload() {
        assert_eq!(decode(b"\\b").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn odd_length_hex_is_rejected() {
        assert!(matches!(
            decode(b"\\bfff"),
            Err(DecodeError::MalformedHexPayload(_))
        ));
    }

    #[test]
    fn non_hex_characters_are_rejected() {
        assert!(matches!(
            decode(b"\\bzz"),
            Err(DecodeError::MalformedHexPayload(_))
        ));
    }
}
