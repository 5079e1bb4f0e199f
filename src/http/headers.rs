//! Header copying between inbound, outbound and relayed messages.
//!
//! `HeaderMap` is the ordered multimap: every value of a repeated header is
//! kept, in the order it was appended. Copies here always `append`, never
//! `insert`, so no value is dropped.
//!
//! Two headers describe the connection rather than the message and are not
//! copied:
//! - `Host`: the outbound client derives it from the target URL
//! - `Transfer-Encoding`: bodies are fully buffered, so framing is recomputed

use axum::http::header::{HOST, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderName};

fn skip_on_request(name: &HeaderName) -> bool {
    *name == HOST || *name == TRANSFER_ENCODING
}

fn skip_on_response(name: &HeaderName) -> bool {
    *name == TRANSFER_ENCODING
}

/// Append every value of every header in `src` to `dst`, except names `skip` rejects.
pub fn append_all(src: &HeaderMap, dst: &mut HeaderMap, skip: impl Fn(&HeaderName) -> bool) {
    for (name, value) in src.iter() {
        if skip(name) {
            continue;
        }
        dst.append(name.clone(), value.clone());
    }
}

/// Headers sent upstream on every hop, copied from the inbound request.
pub fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    append_all(inbound, &mut headers, skip_on_request);
    headers
}

/// Headers relayed to the caller, copied from the terminal upstream response.
pub fn relayed_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    append_all(upstream, &mut headers, skip_on_response);
    headers
}
