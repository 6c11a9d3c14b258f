//! TLS channel binding (Extended Protection for Authentication).
//!
//! Builds the RFC 5929 `tls-server-end-point` binding token from the peer
//! certificate and packs it into the `SEC_CHANNEL_BINDINGS` wire layout the
//! security provider consumes. The binding ties the handshake to the TLS
//! connection it traveled over; without it Kerberos against servers with
//! channel-binding enforcement fails.

use sha2::{Digest, Sha256};

const TLS_SERVER_END_POINT_PREFIX: &[u8] = b"tls-server-end-point:";

// SEC_CHANNEL_BINDINGS: eight little-endian u32 fields, application data
// packed immediately after the header.
const HEADER_LEN: usize = 32;
const APPLICATION_DATA_OFFSET: u32 = 32;

/// Derives the channel binding token for a peer certificate.
///
/// The application data is `"tls-server-end-point:" + SHA-256(certificate)`
/// over the raw DER bytes; the header carries only the application data
/// length and offset, with the initiator/acceptor fields zeroed.
pub fn channel_binding_token(peer_certificate_der: &[u8]) -> Vec<u8> {
    let digest = Sha256::digest(peer_certificate_der);

    let mut application_data =
        Vec::with_capacity(TLS_SERVER_END_POINT_PREFIX.len() + digest.len());
    application_data.extend_from_slice(TLS_SERVER_END_POINT_PREFIX);
    application_data.extend_from_slice(&digest);

    let mut token = Vec::with_capacity(HEADER_LEN + application_data.len());
    let header: [u32; 8] = [
        0, // initiator addr type
        0, // initiator length
        0, // initiator offset
        0, // acceptor addr type
        0, // acceptor length
        0, // acceptor offset
        application_data.len() as u32,
        APPLICATION_DATA_OFFSET,
    ];
    for field in header {
        token.extend_from_slice(&field.to_le_bytes());
    }
    token.extend_from_slice(&application_data);
    token
}
