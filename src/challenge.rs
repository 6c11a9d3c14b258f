//! Server challenge extraction.

use base64::Engine as _;
use http::header::WWW_AUTHENTICATE;
use http::HeaderMap;

use crate::negotiate::Scheme;
use crate::{Error, Result};

/// Extracts the single challenge token for `scheme` from the response's
/// `WWW-Authenticate` headers.
///
/// Each header value is split on `", "` and entries mentioning the scheme
/// are kept with their `"{scheme} "` prefix stripped. Anything other than
/// exactly one match is a protocol violation: picking one of several
/// candidate challenges would feed the wrong token into the context.
pub(crate) fn extract_challenge(headers: &HeaderMap, scheme: Scheme) -> Result<Vec<u8>> {
    let name = scheme.as_str();

    let mut matches = Vec::new();
    for value in headers.get_all(WWW_AUTHENTICATE) {
        let Ok(value) = value.to_str() else { continue };
        for entry in value.split(", ") {
            if entry.contains(name) {
                matches.push(entry.get(name.len() + 1..).unwrap_or("").to_owned());
            }
        }
    }

    if matches.len() != 1 {
        return Err(Error::Protocol(format!(
            "did not get exactly one {} challenge from server ({} found)",
            name,
            matches.len()
        )));
    }

    base64::engine::general_purpose::STANDARD
        .decode(&matches[0])
        .map_err(|err| Error::Protocol(format!("undecodable {} challenge: {}", name, err)))
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn headers(values: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(WWW_AUTHENTICATE, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn single_challenge_is_decoded() {
        let headers = headers(&["NTLM TlRMTVNTUAACAAAA"]);
        let token = extract_challenge(&headers, Scheme::Ntlm).unwrap();
        assert_eq!(&token[..8], b"NTLMSSP\0");
    }

    #[test]
    fn other_schemes_in_the_same_header_are_ignored() {
        let headers = headers(&["NTLM TlRMTVNTUAACAAAA, Basic realm=\"x\""]);
        assert!(extract_challenge(&headers, Scheme::Ntlm).is_ok());
    }

    #[test]
    fn zero_matches_is_a_protocol_error() {
        let headers = headers(&["Basic realm=\"x\""]);
        let err = extract_challenge(&headers, Scheme::Negotiate).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn multiple_matches_is_a_protocol_error() {
        let headers = headers(&["Negotiate dG9rZW4x", "Negotiate dG9rZW4y"]);
        let err = extract_challenge(&headers, Scheme::Negotiate).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn multiple_matches_in_one_header_value() {
        let headers = headers(&["Negotiate dG9rZW4x, Negotiate dG9rZW4y"]);
        assert!(extract_challenge(&headers, Scheme::Negotiate)
            .unwrap_err()
            .is_protocol());
    }

    #[test]
    fn bare_scheme_yields_an_empty_token() {
        let headers = headers(&["Negotiate"]);
        let token = extract_challenge(&headers, Scheme::Negotiate).unwrap();
        assert!(token.is_empty());
    }

    #[test]
    fn garbage_base64_is_a_protocol_error() {
        let headers = headers(&["Negotiate %%%not-base64%%%"]);
        assert!(extract_challenge(&headers, Scheme::Negotiate)
            .unwrap_err()
            .is_protocol());
    }
}
