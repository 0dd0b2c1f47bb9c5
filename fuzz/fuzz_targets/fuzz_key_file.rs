#![no_main]
use libfuzzer_sys::fuzz_target;
use wa_crypt_stream::crypto::unwrap_key_file;
use wa_crypt_stream::parsing::KeyFileParser;
use wa_crypt_stream::CryptVersion;

fuzz_target!(|data: &[u8]| {
    let _ = KeyFileParser::parse(CryptVersion::Crypt12, data);
    let _ = unwrap_key_file(CryptVersion::Crypt12, data);
});
