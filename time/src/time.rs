use std::time::{SystemTime, UNIX_EPOCH};

// 系统时钟早于UNIX_EPOCH时返回0
pub fn get_current_nano_timestamp() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

pub fn get_current_milli_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
