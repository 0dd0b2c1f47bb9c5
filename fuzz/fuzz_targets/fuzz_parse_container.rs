#![no_main]
use libfuzzer_sys::fuzz_target;
use wa_crypt_stream::parsing::ContainerFrame;
use wa_crypt_stream::CryptVersion;

fuzz_target!(|data: &[u8]| {
    for version in CryptVersion::ALL {
        if let Ok(frame) = ContainerFrame::parse(version.profile(), data) {
            let _ = frame.ciphertext(data);
            let _ = frame.tag(data);
            let _ = frame.signed_region(data);
            let _ = frame.account_suffix(data);
        }
    }
});
