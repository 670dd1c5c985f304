//! OAuth1 (HMAC-SHA1) request signing for the token preauthorization and
//! exchange endpoints.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use ring::hmac;
use serde::Deserialize;

/// Length of the random nonce sent with each signed request
const NONCE_LENGTH: usize = 32;

/// Consumer key pair identifying the mobile application to the provider.
#[derive(Clone, Deserialize)]
pub struct OAuthConsumer {
    pub consumer_key: String,
    pub consumer_secret: String,
}

/// Build the `Authorization` header for a signed request.
///
/// `params` are the query-string and form-body parameters of the request;
/// they take part in the signature but are not repeated in the header.
pub(crate) fn authorization_header(
    consumer: &OAuthConsumer,
    token: Option<(&str, &str)>,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
) -> String {
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect();
    let timestamp = Utc::now().timestamp().to_string();
    signed_header(consumer, token, method, url, params, &nonce, &timestamp)
}

fn signed_header(
    consumer: &OAuthConsumer,
    token: Option<(&str, &str)>,
    method: &str,
    url: &str,
    params: &[(&str, &str)],
    nonce: &str,
    timestamp: &str,
) -> String {
    let mut oauth_params: Vec<(&str, &str)> = vec![
        ("oauth_consumer_key", consumer.consumer_key.as_str()),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_version", "1.0"),
    ];
    if let Some((key, _)) = token {
        oauth_params.push(("oauth_token", key));
    }

    let base = signature_base_string(method, url, oauth_params.iter().chain(params.iter()));
    let signing_key = format!(
        "{}&{}",
        encode(&consumer.consumer_secret),
        encode(token.map(|(_, secret)| secret).unwrap_or(""))
    );
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, signing_key.as_bytes());
    let signature = STANDARD.encode(hmac::sign(&key, base.as_bytes()).as_ref());

    oauth_params.push(("oauth_signature", signature.as_str()));
    oauth_params.sort();
    let fields: Vec<String> = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect();
    format!("OAuth {}", fields.join(", "))
}

fn signature_base_string<'a>(
    method: &str,
    url: &str,
    params: impl Iterator<Item = &'a (&'a str, &'a str)>,
) -> String {
    let mut encoded: Vec<(String, String)> = params.map(|(k, v)| (encode(k), encode(v))).collect();
    encoded.sort();
    let joined: Vec<String> = encoded.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(url),
        encode(&joined.join("&"))
    )
}

/// RFC 3986 percent-encoding: everything except unreserved characters.
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumer() -> OAuthConsumer {
        OAuthConsumer {
            consumer_key: "ckey".to_string(),
            consumer_secret: "csecret".to_string(),
        }
    }

    #[test]
    fn test_signature_base_string_sorts_and_encodes() {
        let params = [("b", "2 3"), ("a", "1")];
        let base = signature_base_string("get", "https://example.com/path", params.iter());
        assert_eq!(base, "GET&https%3A%2F%2Fexample.com%2Fpath&a%3D1%26b%3D2%25203");
    }

    #[test]
    fn test_signed_header_is_deterministic_for_fixed_nonce() {
        let first = signed_header(&consumer(), None, "GET", "https://x.test", &[], "n", "1");
        let second = signed_header(&consumer(), None, "GET", "https://x.test", &[], "n", "1");
        assert_eq!(first, second);
        assert!(first.starts_with("OAuth "));
        assert!(first.contains("oauth_consumer_key=\"ckey\""));
        assert!(first.contains("oauth_signature_method=\"HMAC-SHA1\""));
        assert!(!first.contains("oauth_token="));
    }

    #[test]
    fn test_signed_header_includes_token_and_changes_signature() {
        let without = signed_header(&consumer(), None, "POST", "https://x.test", &[], "n", "1");
        let with = signed_header(
            &consumer(),
            Some(("tkey", "tsecret")),
            "POST",
            "https://x.test",
            &[],
            "n",
            "1",
        );
        assert!(with.contains("oauth_token=\"tkey\""));
        assert!(!with.contains("tsecret"));
        assert_ne!(without, with);
    }

    #[test]
    fn test_signature_covers_request_params() {
        let a = signed_header(&consumer(), None, "GET", "https://x.test", &[("ticket", "1")], "n", "1");
        let b = signed_header(&consumer(), None, "GET", "https://x.test", &[("ticket", "2")], "n", "1");
        assert_ne!(a, b);
        assert!(!a.contains("ticket"));
    }

    #[test]
    fn test_authorization_header_uses_fresh_nonce() {
        let a = authorization_header(&consumer(), None, "GET", "https://x.test", &[]);
        let b = authorization_header(&consumer(), None, "GET", "https://x.test", &[]);
        assert_ne!(a, b);
    }
}
