#![no_main]

use jsabsint::{Analyzer, AnalyzerConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Only process valid UTF-8
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    // Limit input size to avoid timeout
    if source.len() > 100_000 {
        return;
    }

    let config = AnalyzerConfig {
        max_rounds: 64,
        max_loop_iterations: 1_000,
        ..AnalyzerConfig::default()
    };

    // Analysis should return Ok or Err, never panic
    let _ = Analyzer::with_config(config).analyze_json(source);
});
