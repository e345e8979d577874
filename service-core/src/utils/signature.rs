use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `payload` under `secret`, hex encoded.
pub fn hmac_sha256_hex(secret: &str, payload: &str) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Canonical `key=value&key=value` form with keys in ascending order.
pub fn canonical_query(fields: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = fields.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign a set of fields the way payment providers sign checkout requests:
/// HMAC-SHA256 over the canonical query string.
pub fn sign_fields(secret: &str, fields: &[(&str, String)]) -> Result<String, anyhow::Error> {
    hmac_sha256_hex(secret, &canonical_query(fields))
}

/// Verify a hex HMAC-SHA256 signature over `payload` using constant-time comparison.
pub fn verify_payload(secret: &str, payload: &str, signature: &str) -> Result<bool, anyhow::Error> {
    let expected_signature = hmac_sha256_hex(secret, payload)?;

    let expected_bytes = expected_signature.as_bytes();
    let signature_bytes = signature.trim().to_ascii_lowercase();
    let signature_bytes = signature_bytes.as_bytes();

    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(signature_bytes).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_query_sorts_keys() {
        let fields = [
            ("returnUrl", "https://shop/success".to_string()),
            ("amount", "5000".to_string()),
            ("orderCode", "42".to_string()),
        ];
        assert_eq!(
            canonical_query(&fields),
            "amount=5000&orderCode=42&returnUrl=https://shop/success"
        );
    }

    #[test]
    fn test_sign_fields_is_order_independent() {
        let a = [("b", "2".to_string()), ("a", "1".to_string())];
        let b = [("a", "1".to_string()), ("b", "2".to_string())];
        assert_eq!(
            sign_fields("checksum", &a).unwrap(),
            sign_fields("checksum", &b).unwrap()
        );
    }

    #[test]
    fn test_verify_payload() {
        let body = r#"{"paymentLinkId":"abc","status":"PAID"}"#;
        let signature = hmac_sha256_hex("checksum", body).unwrap();

        assert!(verify_payload("checksum", body, &signature).unwrap());
        assert!(verify_payload("checksum", body, &signature.to_uppercase()).unwrap());
        assert!(!verify_payload("other", body, &signature).unwrap());
        assert!(!verify_payload("checksum", r#"{"paymentLinkId":"abc"}"#, &signature).unwrap());
        assert!(!verify_payload("checksum", body, "deadbeef").unwrap());
    }
}
