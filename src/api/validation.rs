use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::ApiError;
use crate::constants::profile::SYNC_CODE_LEN;

pub const MAX_PAGE: u64 = 9999;

/// Pages are 1-based; a missing page means the first one.
pub fn validate_page(page: Option<u64>) -> Result<u64, ApiError> {
    let page = page.unwrap_or(1);
    if !(1..=MAX_PAGE).contains(&page) {
        return Err(ApiError::validation(format!(
            "Invalid page: {page}. Page must be between 1 and {MAX_PAGE}"
        )));
    }
    Ok(page)
}

pub fn validate_search_query(query: &str) -> Result<&str, ApiError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Search query is required"));
    }
    Ok(trimmed)
}

pub fn validate_sync_code(code: &str) -> Result<&str, ApiError> {
    let trimmed = code.trim();
    if trimmed.chars().count() != SYNC_CODE_LEN {
        return Err(ApiError::validation(format!(
            "Sync code must be {SYNC_CODE_LEN} characters"
        )));
    }
    Ok(trimmed)
}

pub fn validate_captcha_token(token: &str) -> Result<&str, ApiError> {
    if token.trim().is_empty() {
        return Err(ApiError::validation("turnstile_token is required"));
    }
    Ok(token)
}

/// Reads a required, non-empty header.
pub fn require_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized(format!("{name} header required")))
}

/// Decodes a base64 avatar payload, accepting an optional `data:` URL prefix.
pub fn decode_image_payload(payload: &str, max_bytes: usize) -> Result<Vec<u8>, ApiError> {
    let encoded = payload
        .split_once(";base64,")
        .map_or(payload, |(_, data)| data)
        .trim();

    if encoded.is_empty() {
        return Err(ApiError::validation("image is required"));
    }

    // Base64 inflates by 4/3; reject before decoding anything oversized.
    if encoded.len() / 4 * 3 > max_bytes + 3 {
        return Err(ApiError::validation(format!(
            "Image must be at most {max_bytes} bytes"
        )));
    }

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| ApiError::validation("image must be valid base64"))?;

    if bytes.len() > max_bytes {
        return Err(ApiError::validation(format!(
            "Image must be at most {max_bytes} bytes"
        )));
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_validate_page() {
        assert_eq!(validate_page(None).unwrap(), 1);
        assert_eq!(validate_page(Some(3)).unwrap(), 3);
        assert!(validate_page(Some(0)).is_err());
        assert!(validate_page(Some(10_000)).is_err());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  dragon ").unwrap(), "dragon");
        assert!(validate_search_query("   ").is_err());
    }

    #[test]
    fn test_validate_sync_code_length() {
        assert!(validate_sync_code("ABCD2345").is_ok());
        assert!(validate_sync_code("ABC").is_err());
        assert!(validate_sync_code("ABCD23456").is_err());
    }

    #[test]
    fn test_require_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-profile-id", HeaderValue::from_static("abc"));
        headers.insert("x-secret-token", HeaderValue::from_static("  "));

        assert_eq!(require_header(&headers, "x-profile-id").unwrap(), "abc");
        assert!(require_header(&headers, "x-secret-token").is_err());
        assert!(require_header(&headers, "x-missing").is_err());
    }

    #[test]
    fn test_decode_image_payload() {
        let encoded = STANDARD.encode(b"hello");
        assert_eq!(decode_image_payload(&encoded, 100).unwrap(), b"hello");

        let data_url = format!("data:image/png;base64,{encoded}");
        assert_eq!(decode_image_payload(&data_url, 100).unwrap(), b"hello");

        assert!(decode_image_payload(&encoded, 4).is_err());
        assert!(decode_image_payload("!!!", 100).is_err());
        assert!(decode_image_payload("", 100).is_err());
    }
}
