#![no_main]
use libfuzzer_sys::fuzz_target;

use h1_oneshot::decode::RequestDecoder;
use h1_oneshot::http11::try_parse_req;

fuzz_target!(|data: &[u8]| {
    if let Ok(Some((req, _))) = try_parse_req(data) {
        let (parts, _) = req.into_parts();

        let mut decoder = RequestDecoder::new();

        if let Ok(request) = decoder.on_head(parts) {
            let _ = request.path_components();
            let _ = request.query_items();
            let _ = decoder.on_end();
        }
    }
});
