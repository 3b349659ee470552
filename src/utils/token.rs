//! Generación de tokens de cliente
//!
//! Formato `VLT-` + 9 dígitos: 6 dígitos del timestamp en milisegundos y 3
//! aleatorios. La unicidad la garantiza el store, que rechaza colisiones.

use chrono::{DateTime, Utc};
use rand::Rng;

pub const TOKEN_PREFIX: &str = "VLT-";

pub fn generate_token(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().rem_euclid(1_000_000);
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("{}{:06}{:03}", TOKEN_PREFIX, millis, suffix)
}

pub fn is_valid_token(token: &str) -> bool {
    token
        .strip_prefix(TOKEN_PREFIX)
        .map_or(false, |digits| digits.len() == 9 && digits.chars().all(|c| c.is_ascii_digit()))
}
