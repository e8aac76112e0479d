use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Creates an HMAC-SHA256 signature for a signed-endpoint query string.
///
/// Binance requires every private call to carry a signature over the full
/// query string, timestamp included.
pub fn sign_request(secret: &str, query_string: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(query_string.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_hex() {
        let a = sign_request("secret", "symbol=BTCUSDT&timestamp=1");
        let b = sign_request("secret", "symbol=BTCUSDT&timestamp=1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_depends_on_secret() {
        let a = sign_request("secret-a", "symbol=BTCUSDT");
        let b = sign_request("secret-b", "symbol=BTCUSDT");
        assert_ne!(a, b);
    }
}
