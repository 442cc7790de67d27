#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    let Ok(cfg) = vend_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // A valid config must survive being written back out.
    let text = toml::to_string_pretty(&cfg).expect("serialize valid config");
    let again = vend_config::load_toml(&text).expect("reparse written config");
    assert!(again.validate().is_ok());
});
