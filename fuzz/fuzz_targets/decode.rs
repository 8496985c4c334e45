#![no_main]
use opaque_id::SecureIdCodec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let codec = SecureIdCodec::from_secret(&"ab".repeat(32)).unwrap();
    let encoded = String::from_utf8_lossy(data);
    if let Ok(id) = codec.decode(&encoded) {
        assert_eq!(codec.decode(&codec.encode(id)), Ok(id));
    }
});
