#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // First four bytes pick the target, the rest is a newline separated option list
    if data.len() < 4 {
        return;
    }
    let target = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) % 64;
    let options: Vec<String> = String::from_utf8_lossy(&data[4..])
        .split('\n')
        .map(str::to_string)
        .collect();

    if let Some(level) = chargectl::reconcile::select_level(target, &options) {
        assert!(options.contains(&level));
        let value: i64 = level.trim().parse().unwrap_or(i64::MIN);
        assert!(level == target.to_string() || value <= i64::from(target));
    }
});
