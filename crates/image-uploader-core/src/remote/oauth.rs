//! OAuth 1.0a request signing (RFC 5849, HMAC-SHA1).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;

use crate::config::FlickrConfig;
use crate::error::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

/// Characters left unencoded by RFC 3986
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Consumer and token credentials
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl From<&FlickrConfig> for OAuthCredentials {
    fn from(flickr: &FlickrConfig) -> Self {
        Self {
            consumer_key: flickr.api_key.clone(),
            consumer_secret: flickr.api_secret.clone(),
            token: flickr.oauth_token.clone(),
            token_secret: flickr.oauth_secret.clone(),
        }
    }
}

pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

impl OAuthCredentials {
    /// Return `params` extended with the oauth_* protocol parameters and
    /// the signature for a request to `url`
    pub fn sign(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<Vec<(String, String)>> {
        let mut signed: Vec<(String, String)> = params.to_vec();
        signed.extend([
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ]);

        let signature = self.signature(method, url, &signed)?;
        signed.push(("oauth_signature".to_string(), signature));
        Ok(signed)
    }

    /// Sign with a fresh nonce and the current time
    pub fn sign_now(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> Result<Vec<(String, String)>> {
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        self.sign(method, url, params, &nonce, chrono::Utc::now().timestamp())
    }

    fn signature(&self, method: &str, url: &str, params: &[(String, String)]) -> Result<String> {
        let mut encoded: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .collect();
        encoded.sort();

        let normalized = encoded
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let base_string = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            percent_encode(url),
            percent_encode(&normalized)
        );
        let key = format!(
            "{}&{}",
            percent_encode(&self.consumer_secret),
            percent_encode(&self.token_secret)
        );

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| Error::Configuration(format!("Invalid OAuth signing key: {}", e)))?;
        mac.update(base_string.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}
