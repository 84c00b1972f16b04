use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

const REFERENCE_PREFIX: &str = "ST";
const SUFFIX_LEN: usize = 4;
const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Human-readable booking reference: `ST` + base-36 millisecond timestamp + random suffix.
pub fn generate_reference<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let millis = now.timestamp_millis().max(0) as u64;
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();

    format!("{}{}{}", REFERENCE_PREFIX, to_base36(millis), suffix)
}

/// Opaque QR payload presented at check-in.
pub fn generate_check_in_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
