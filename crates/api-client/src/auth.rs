use hmac::{Hmac, Mac};
use sha2::Sha256;

// Create a type alias for the HMAC-SHA256 implementation.
type HmacSha256 = Hmac<Sha256>;

/// Creates an HMAC-SHA256 signature for a given query string.
///
/// Binance requires all private API calls to be signed. This function implements
/// the required signing logic according to their documentation.
///
/// # Arguments
///
/// * `secret` - The user's API secret key.
/// * `query_string` - The full query string of the request, including the timestamp.
///
/// # Returns
///
/// A hexadecimal string representation of the signature.
pub fn sign_request(secret: &str, query_string: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");

    mac.update(query_string.as_bytes());

    let result = mac.finalize();
    let code_bytes = result.into_bytes();

    // The API expects the signature as a hexadecimal string.
    hex::encode(code_bytes)
}
