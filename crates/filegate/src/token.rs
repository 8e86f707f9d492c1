use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Structural frame around the storage item id. A compatibility guard against
/// foreign or cross-version tokens, not a security boundary.
const TAG_PREFIX: &str = "File";
const TAG_SUFFIX: &str = "Secure";

/// Encode a storage item id into an opaque access token.
///
/// The token uses the base64url alphabet without padding, so it can be placed
/// directly into a URL query parameter.
pub fn encode(storage_item_id: i32) -> String {
    URL_SAFE_NO_PAD.encode(format!("{TAG_PREFIX}_{storage_item_id}_{TAG_SUFFIX}"))
}

/// Decode an access token back to its storage item id.
///
/// Total: malformed base64, invalid UTF-8, a wrong structural frame, or a
/// non-numeric payload segment all yield `None`.
pub fn decode(token: &str) -> Option<i32> {
    let bytes = URL_SAFE_NO_PAD.decode(token).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let mut parts = text.split('_');
    let (prefix, payload, suffix) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || prefix != TAG_PREFIX || suffix != TAG_SUFFIX {
        return None;
    }
    let id: i32 = payload.parse().ok()?;
    (id >= 0).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_exact() {
        for id in [0, 1, 42, 9999, i32::MAX] {
            assert_eq!(decode(&encode(id)), Some(id));
        }
    }

    #[test]
    fn encoded_token_is_query_safe() {
        let token = encode(i32::MAX);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn decode_empty_string() {
        assert_eq!(decode(""), None);
    }

    #[test]
    fn decode_garbage() {
        assert_eq!(decode("!!not base64!!"), None);
        assert_eq!(decode("    "), None);
    }

    #[test]
    fn decode_padded_token_rejected() {
        // The no-pad engine refuses padding characters outright.
        assert_eq!(decode("RmlsZV8xX1NlY3VyZQ=="), None);
    }

    #[test]
    fn decode_wrong_frame() {
        let foreign = URL_SAFE_NO_PAD.encode("Movie_5_Secure");
        assert_eq!(decode(&foreign), None);
        let truncated = URL_SAFE_NO_PAD.encode("File_5");
        assert_eq!(decode(&truncated), None);
    }

    #[test]
    fn decode_non_numeric_payload() {
        let bad = URL_SAFE_NO_PAD.encode("File_abc_Secure");
        assert_eq!(decode(&bad), None);
    }

    #[test]
    fn decode_negative_payload() {
        let bad = URL_SAFE_NO_PAD.encode("File_-3_Secure");
        assert_eq!(decode(&bad), None);
    }

    #[test]
    fn decode_extra_segments() {
        let bad = URL_SAFE_NO_PAD.encode("File_1_2_Secure");
        assert_eq!(decode(&bad), None);
    }

    #[test]
    fn decode_invalid_utf8() {
        let bad = URL_SAFE_NO_PAD.encode([0xFF, 0xFE, 0x00]);
        assert_eq!(decode(&bad), None);
    }
}
