//! HMAC-SHA256 webhook signature verification (§11 supplemented
//! behaviour): constant-time compare via `hmac`'s own `verify_slice`,
//! never a manual byte comparison.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// `header` is expected in `sha256=<hex>` form (the common webhook
/// convention); a bare hex digest is also accepted.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let hex_digest = header.strip_prefix("sha256=").unwrap_or(header);
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_verifies() {
        let body = b"{\"hello\":\"world\"}";
        let sig = sign("secret", body);
        assert!(verify_signature("secret", body, &sig));
    }

    #[test]
    fn wrong_secret_fails() {
        let body = b"{\"hello\":\"world\"}";
        let sig = sign("secret", body);
        assert!(!verify_signature("other-secret", body, &sig));
    }

    #[test]
    fn tampered_body_fails() {
        let body = b"{\"hello\":\"world\"}";
        let sig = sign("secret", body);
        assert!(!verify_signature("secret", b"{\"hello\":\"mars\"}", &sig));
    }

    #[test]
    fn malformed_header_fails_closed() {
        assert!(!verify_signature("secret", b"body", "not-hex"));
    }
}
