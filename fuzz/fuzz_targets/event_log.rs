#![no_main]

use keyguard::capture::{CaptureConfig, SessionCapture};
use keyguard::replay::replay_events;
use keyguard::Phrase;
use libfuzzer_sys::fuzz_target;
use std::time::Instant;

fuzz_target!(|data: &[u8]| {
    // Arbitrary key logs must never panic the parser or the capture machine
    if let Ok(input) = std::str::from_utf8(data) {
        let Ok(events) = replay_events(input, Instant::now()) else {
            return;
        };
        let Ok(phrase) = Phrase::new("abc") else {
            return;
        };
        let Ok(config) = CaptureConfig::new(phrase, 3, 3, 0.05) else {
            return;
        };

        let mut capture = SessionCapture::new(config);
        capture.start(0);
        for event in events {
            let _ = capture.handle(event);
        }
    }
});
