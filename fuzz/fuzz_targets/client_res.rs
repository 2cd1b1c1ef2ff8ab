#![no_main]
use libfuzzer_sys::fuzz_target;

use h1_oneshot::http11::try_parse_res;

fuzz_target!(|data: &[u8]| {
    let _ = try_parse_res(data);
});
