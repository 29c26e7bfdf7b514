#![no_main]

use libfuzzer_sys::fuzz_target;
use shipwatch::config::DetectorConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // A config that parses must also have passed validation
        if let Ok(config) = DetectorConfig::from_toml_str(input) {
            assert!(config.validate().is_ok());
        }
    }
});
