pub const DELETED: &str = "deleted";

pub const KEY_LEN: usize = 22;
pub const TOKEN_LEN: usize = 64;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing query parameter `{0}`")]
    Missing(&'static str),
    #[error("device token is neither 64 lowercase hex characters nor `deleted`")]
    MalformedToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceToken<'a> {
    Deleted,
    Live(&'a str),
}

impl<'a> DeviceToken<'a> {
    pub fn as_str(&self) -> &'a str {
        match self {
            DeviceToken::Deleted => DELETED,
            DeviceToken::Live(token) => token,
        }
    }
}

/// A request whose token passed validation. The key is kept verbatim, even
/// when malformed; the resolver decides whether it is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterRequest<'a> {
    pub key: &'a str,
    pub token: DeviceToken<'a>,
}

pub fn validate<'a>(
    key: Option<&'a str>,
    token: Option<&'a str>,
) -> Result<RegisterRequest<'a>, ValidationError> {
    let key = key.ok_or(ValidationError::Missing("key"))?;
    let token = token.ok_or(ValidationError::Missing("devicetoken"))?;

    let token = if token == DELETED {
        DeviceToken::Deleted
    } else if is_device_token(token) {
        DeviceToken::Live(token)
    } else {
        return Err(ValidationError::MalformedToken);
    };

    Ok(RegisterRequest { key, token })
}

pub fn is_device_token(s: &str) -> bool {
    s.len() == TOKEN_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

pub fn is_device_key(s: &str) -> bool {
    s.len() == KEY_LEN && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_hex_token_and_sentinel() {
        let token = "0123456789abcdef".repeat(4);
        assert_eq!(
            validate(Some(""), Some(token.as_str())),
            Ok(RegisterRequest {
                key: "",
                token: DeviceToken::Live(&token)
            })
        );
        assert_eq!(
            validate(Some("whatever"), Some("deleted")).map(|r| r.token),
            Ok(DeviceToken::Deleted)
        );
    }

    #[test]
    fn rejects_bad_tokens_for_any_key() {
        let upper = "A".repeat(64);
        let short = "a".repeat(63);
        let long = "a".repeat(65);
        let non_hex = "g".repeat(64);
        let good_key = "a".repeat(22);

        for token in ["", "Deleted", upper.as_str(), short.as_str(), long.as_str(), non_hex.as_str()] {
            for key in ["", "short", good_key.as_str()] {
                assert_eq!(
                    validate(Some(key), Some(token)),
                    Err(ValidationError::MalformedToken),
                    "token {token:?} key {key:?}"
                );
            }
        }
    }

    #[test]
    fn missing_parameters() {
        let token = "a".repeat(64);
        assert_eq!(validate(None, Some(token.as_str())), Err(ValidationError::Missing("key")));
        assert_eq!(validate(Some(""), None), Err(ValidationError::Missing("devicetoken")));
    }

    #[test]
    fn malformed_key_passes_through() {
        let token = "b".repeat(64);
        assert_eq!(validate(Some("not a key!"), Some(token.as_str())).map(|r| r.key), Ok("not a key!"));
    }

    #[test]
    fn key_shape() {
        assert!(is_device_key("abcdefghijABCDEFGHIJ01"));
        assert!(!is_device_key("abcdefghijABCDEFGHIJ0"));
        assert!(!is_device_key("abcdefghijABCDEFGHIJ0_"));
        assert!(!is_device_key(""));
    }
}
