//! `x-webhook-signature: t=<unix>,v1=<hex>` where the hex is
//! HMAC-SHA256(secret, "<t>.<raw body>"). Several `v1` entries may be present
//! while the gateway rotates secrets.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::app_error::{AppError, AppResult};

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Maximum clock difference accepted between the gateway and us.
pub const TOLERANCE_SECS: i64 = 300;

pub fn sign(payload: &str, timestamp: i64, secret: &str) -> AppResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC key error".into()))?;
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Header value for `payload` signed at `timestamp`.
pub fn signature_header(payload: &str, timestamp: i64, secret: &str) -> AppResult<String> {
    Ok(format!("t={timestamp},v1={}", sign(payload, timestamp, secret)?))
}

pub fn verify(payload: &str, header: &str, secret: &str, now: i64) -> AppResult<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let ts: i64 = timestamp
        .and_then(|t| t.parse().ok())
        .ok_or(AppError::InvalidSignature)?;
    if signatures.is_empty() {
        return Err(AppError::InvalidSignature);
    }

    let expected = sign(payload, ts, secret)?;
    if !signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected))
    {
        return Err(AppError::InvalidSignature);
    }

    if (now - ts).abs() > TOLERANCE_SECS {
        tracing::warn!(timestamp = ts, now, "Webhook signature outside tolerance");
        return Err(AppError::InvalidSignature);
    }
    Ok(())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
