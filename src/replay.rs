//! Request replay between handshake rounds.

use http::header::{CONTENT_LENGTH, COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};

use crate::transport::{Request, Response};
use crate::Result;

/// Produces the next outgoing request from the response of the previous
/// round.
///
/// Rewinds the request body (by `-Content-Length` from the current read
/// position when the length is known, otherwise to the start), drains the
/// response body and hands the connection back so the retry can reuse it,
/// then clones the request shell and carries any `Set-Cookie` values
/// forward as `Cookie`. Some web applications store authentication state
/// in cookies, so losing them between rounds breaks the handshake. No
/// other header is touched.
pub(crate) fn replay(response: &mut Response) -> Result<Request> {
    let content_length = response
        .request()
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0);
    response.request_mut().body_mut().rewind(content_length)?;

    response.release_connection()?;

    let mut request = response.request_mut().replay_clone();

    if let Some(cookie) = folded_set_cookie(response.headers()) {
        request.headers_mut().insert(COOKIE, cookie);
    }

    Ok(request)
}

/// Folds repeated `Set-Cookie` values into one `Cookie` header value.
fn folded_set_cookie(headers: &HeaderMap) -> Option<HeaderValue> {
    let values: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    if values.is_empty() {
        return None;
    }
    HeaderValue::from_str(&values.join(", ")).ok()
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use http::{HeaderMap, Method, StatusCode};
    use url::Url;

    use super::*;
    use crate::transport::{Body, ResponseBody};

    fn response_with(request: Request, headers: HeaderMap) -> Response {
        Response::new(StatusCode::UNAUTHORIZED, headers, ResponseBody::empty(), request)
    }

    fn post_request() -> Request {
        Request::new(Method::POST, Url::parse("http://example.com/api").unwrap())
    }

    #[test]
    fn set_cookie_is_forwarded_as_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, HeaderValue::from_static("session=abc123"));
        let mut response = response_with(post_request(), headers);

        let request = replay(&mut response).unwrap();
        assert_eq!(
            request.headers().get(COOKIE).unwrap(),
            &HeaderValue::from_static("session=abc123")
        );
    }

    #[test]
    fn cookie_overwrites_any_prior_value() {
        let mut request = post_request();
        request
            .headers_mut()
            .insert(COOKIE, HeaderValue::from_static("stale=1"));

        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, HeaderValue::from_static("fresh=2"));
        let mut response = response_with(request, headers);

        let request = replay(&mut response).unwrap();
        let cookies: Vec<_> = request.headers().get_all(COOKIE).iter().collect();
        assert_eq!(cookies, vec![&HeaderValue::from_static("fresh=2")]);
    }

    #[test]
    fn multiple_set_cookie_values_are_folded() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));
        let mut response = response_with(post_request(), headers);

        let request = replay(&mut response).unwrap();
        assert_eq!(
            request.headers().get(COOKIE).unwrap(),
            &HeaderValue::from_static("a=1, b=2")
        );
    }

    #[test]
    fn absent_set_cookie_leaves_prior_cookie_alone() {
        let mut request = post_request();
        request
            .headers_mut()
            .insert(COOKIE, HeaderValue::from_static("keep=me"));
        let mut response = response_with(request, HeaderMap::new());

        let request = replay(&mut response).unwrap();
        assert_eq!(
            request.headers().get(COOKIE).unwrap(),
            &HeaderValue::from_static("keep=me")
        );
    }

    #[test]
    fn body_is_rewound_by_content_length() {
        let mut request = post_request();
        request
            .headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from_static("10"));
        let mut cursor = Cursor::new(b"0123456789".to_vec());
        let mut sink = Vec::new();
        cursor.read_to_end(&mut sink).unwrap();
        request.set_body(Body::seekable(cursor));

        let mut response = response_with(request, HeaderMap::new());
        let mut request = replay(&mut response).unwrap();

        if let Body::Seekable(reader) = request.body_mut() {
            let mut replayed = Vec::new();
            reader.read_to_end(&mut replayed).unwrap();
            assert_eq!(replayed, b"0123456789");
        } else {
            panic!("seekable body expected");
        }
    }
}
