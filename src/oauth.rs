//! OAuth 1.0a request signing (HMAC-SHA1), as required by the messaging
//! history API.

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use itertools::Itertools;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::{Method, Url};
use sha1::Sha1;

use crate::config::OAuthEnvironment;

type HmacSha1 = Hmac<Sha1>;

/// Everything but the unreserved characters of RFC 3986.
const ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const VERSION: &str = "1.0";

fn encode(value: &str) -> String {
    utf8_percent_encode(value, ENCODE_SET).to_string()
}

#[derive(Clone)]
pub struct OAuth1 {
    consumer_key: String,
    consumer_secret: String,
    token: String,
    token_secret: String,
}

impl From<OAuthEnvironment> for OAuth1 {
    fn from(env: OAuthEnvironment) -> Self {
        Self {
            consumer_key: env.app_key,
            consumer_secret: env.app_secret,
            token: env.access_token,
            token_secret: env.access_token_secret,
        }
    }
}

impl OAuth1 {
    /// Builds the `Authorization` header value for a request with a fresh
    /// nonce and the current timestamp. Only query parameters take part in
    /// the signature; JSON bodies are not signed.
    pub fn authorization(&self, method: &Method, url: &Url) -> Result<String> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp().to_string();

        self.authorization_with(method, url, &nonce, &timestamp)
    }

    fn authorization_with(
        &self,
        method: &Method,
        url: &Url,
        nonce: &str,
        timestamp: &str,
    ) -> Result<String> {
        let protocol = self.protocol_params(nonce, timestamp);
        let signature = self.signature(method, url, &protocol)?;

        let fields = protocol
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .chain(std::iter::once(("oauth_signature", signature.as_str())))
            .map(|(key, value)| format!("{}=\"{}\"", encode(key), encode(value)))
            .join(", ");

        Ok(format!("OAuth {fields}"))
    }

    fn protocol_params(&self, nonce: &str, timestamp: &str) -> Vec<(&'static str, String)> {
        vec![
            ("oauth_consumer_key", self.consumer_key.clone()),
            ("oauth_nonce", nonce.to_owned()),
            ("oauth_signature_method", SIGNATURE_METHOD.to_owned()),
            ("oauth_timestamp", timestamp.to_owned()),
            ("oauth_token", self.token.clone()),
            ("oauth_version", VERSION.to_owned()),
        ]
    }

    fn signature(
        &self,
        method: &Method,
        url: &Url,
        protocol: &[(&'static str, String)],
    ) -> Result<String> {
        let base = base_string(method, url, protocol);
        let key = format!(
            "{}&{}",
            encode(&self.consumer_secret),
            encode(&self.token_secret)
        );

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid OAuth signing key: {e}"))?;
        mac.update(base.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

fn base_string(method: &Method, url: &Url, protocol: &[(&'static str, String)]) -> String {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| (encode(&key), encode(&value)))
        .chain(
            protocol
                .iter()
                .map(|(key, value)| (encode(key), encode(value))),
        )
        .collect();
    params.sort();

    let normalized = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .join("&");

    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    format!(
        "{}&{}&{}",
        method.as_str().to_uppercase(),
        encode(base_url.as_str()),
        encode(&normalized)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photos_client() -> OAuth1 {
        OAuth1 {
            consumer_key: "dpf43f3p2l4k3l03".to_owned(),
            consumer_secret: "kd94hf93k423kf44".to_owned(),
            token: "nnch734d00sl2jdk".to_owned(),
            token_secret: "pfkkdhi9sl3r4s00".to_owned(),
        }
    }

    fn photos_url() -> Url {
        Url::parse("http://photos.example.net/photos?file=vacation.jpg&size=original").unwrap()
    }

    #[test]
    fn base_string_sorts_and_encodes_parameters() {
        let client = photos_client();
        let protocol = client.protocol_params("kllo9940pd9333jh", "1191242096");
        let base = base_string(&Method::GET, &photos_url(), &protocol);

        assert_eq!(
            base,
            "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg%26\
             oauth_consumer_key%3Ddpf43f3p2l4k3l03%26oauth_nonce%3Dkllo9940pd9333jh%26\
             oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1191242096%26\
             oauth_token%3Dnnch734d00sl2jdk%26oauth_version%3D1.0%26size%3Doriginal"
        );
    }

    #[test]
    fn signature_matches_published_vector() {
        let client = photos_client();
        let protocol = client.protocol_params("kllo9940pd9333jh", "1191242096");

        assert_eq!(
            client.signature(&Method::GET, &photos_url(), &protocol).unwrap(),
            "tR3+Ty81lMeYAr/Fid0kMTYa/WM="
        );
    }

    #[test]
    fn header_carries_encoded_signature() {
        let header = photos_client().authorization_with(
            &Method::GET,
            &photos_url(),
            "kllo9940pd9333jh",
            "1191242096",
        )
        .unwrap();

        assert!(header.starts_with("OAuth oauth_consumer_key=\"dpf43f3p2l4k3l03\""));
        assert!(header.contains("oauth_signature=\"tR3%2BTy81lMeYAr%2FFid0kMTYa%2FWM%3D\""));
        assert!(!header.contains("file="));
    }

    #[test]
    fn nonces_differ_between_requests() {
        let client = photos_client();
        let url = photos_url();
        assert_ne!(
            client.authorization(&Method::POST, &url).unwrap(),
            client.authorization(&Method::POST, &url).unwrap()
        );
    }

    #[test]
    fn reserved_characters_are_percent_encoded() {
        assert_eq!(encode("a b+c~d"), "a%20b%2Bc~d");
    }
}
