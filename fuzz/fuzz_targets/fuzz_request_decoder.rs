//! Fuzz target: `RequestDecoder::feed` + `parse_request`
//!
//! Splits arbitrary bytes into chunks the way short socket reads would,
//! feeds them to the head decoder and parses whatever head comes out.
//! The decoder must never panic or yield a head without its terminator.
//!
//! cargo fuzz run fuzz_request_decoder

#![no_main]

use ccsource::net::http::{MAX_HEAD_SIZE, RequestDecoder, Route, parse_request};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let chunk = usize::from(split).max(1);

    let mut decoder = RequestDecoder::new();
    for piece in rest.chunks(chunk) {
        match decoder.feed(piece) {
            Ok(Some(head)) => {
                assert!(head.len() <= MAX_HEAD_SIZE);
                assert!(head.ends_with(b"\r\n\r\n"));
                if let Ok(request) = parse_request(head) {
                    assert!(request.path.starts_with('/'));
                    let _ = Route::resolve(request.path);
                }
                break;
            }
            Ok(None) => assert!(decoder.buffered() < MAX_HEAD_SIZE),
            Err(_) => break,
        }
    }

    decoder.reset();
    assert_eq!(decoder.buffered(), 0);
});
