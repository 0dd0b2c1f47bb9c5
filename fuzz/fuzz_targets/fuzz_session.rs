#![no_main]
use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use wa_crypt_stream::{CryptVersion, DecodeOptions, DecodeSession};

fuzz_target!(|data: &[u8]| {
    // Crypt5 needs no key file, so arbitrary input reaches the cipher and payload checks.
    let opts = DecodeOptions::new()
        .with_version(CryptVersion::Crypt5)
        .with_account("31612345678");
    if let Ok(mut session) = DecodeSession::new("fuzz", Cursor::new(data), opts) {
        let _ = session.decode_to(&mut std::io::sink());
    }

    // For the key file versions the first 158 bytes are the key file.
    if data.len() > 158 {
        let (key, container) = data.split_at(158);
        for version in [CryptVersion::Crypt7, CryptVersion::Crypt8, CryptVersion::Crypt12] {
            let opts = DecodeOptions::new().with_version(version).with_key_file(key);
            if let Ok(mut session) = DecodeSession::new("fuzz", Cursor::new(container), opts) {
                let _ = session.decode_to(&mut std::io::sink());
            }
        }
    }
});
