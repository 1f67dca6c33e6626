use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::error;

use crate::core::config::AppConfig;

/// Requests older than this are treated as replays.
pub const MAX_REQUEST_AGE_SECS: u64 = 300;
/// Tolerated clock skew for timestamps from the future.
pub const MAX_CLOCK_SKEW_SECS: u64 = 60;

pub fn verify_slack_signature(
    request_body: &str,
    timestamp: &str,
    signature: &str,
    config: &AppConfig,
) -> bool {
    let now_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    verify_signature_at(
        request_body,
        timestamp,
        signature,
        &config.slack_signing_secret,
        now_secs,
    )
}

/// Checks the `v0=` HMAC-SHA256 signature against `now_secs`.
pub fn verify_signature_at(
    request_body: &str,
    timestamp: &str,
    signature: &str,
    signing_secret: &str,
    now_secs: u64,
) -> bool {
    let Ok(ts) = timestamp.trim().parse::<u64>() else {
        error!("Invalid request timestamp");
        return false;
    };
    if now_secs.saturating_sub(ts) > MAX_REQUEST_AGE_SECS || ts > now_secs + MAX_CLOCK_SKEW_SECS {
        error!("Timestamp out of range, potential replay attack");
        return false;
    }

    let Some(received) = signature
        .strip_prefix("v0=")
        .and_then(|hex_sig| hex::decode(hex_sig).ok())
    else {
        error!("Malformed signature header");
        return false;
    };

    let mut mac = match Hmac::<Sha256>::new_from_slice(signing_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(e) => {
            error!("Failed to create HMAC: {}", e);
            return false;
        }
    };
    mac.update(format!("v0:{timestamp}:{request_body}").as_bytes());

    if mac.verify_slice(&received).is_ok() {
        true
    } else {
        error!("Signature verification failed");
        false
    }
}

pub fn compute_signature(timestamp: &str, request_body: &str, signing_secret: &str) -> String {
    let base_string = format!("v0:{timestamp}:{request_body}");
    let mut mac = match Hmac::<Sha256>::new_from_slice(signing_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(e) => {
            error!("Failed to create HMAC: {}", e);
            return String::new();
        }
    };
    mac.update(base_string.as_bytes());
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}
