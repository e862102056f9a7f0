use async_trait::async_trait;
use reqwest::header::{ACCEPT, REFERER, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use super::{Profile, ProfileLookupConfig};
use crate::error::{IndexerError, IndexerResult};

/// Base URL of generated avatar images.
pub const AVATAR_BASE_URL: &str = "https://abstract-assets.abs.xyz/avatars";

/// A fetched profile and whether it may be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Profile to hand back to the caller
    pub profile: Profile,
    /// `false` for transient failures that should be retried later
    pub cacheable: bool,
}

impl Fetched {
    /// A stable result, including stable absence.
    #[must_use]
    pub const fn cacheable(profile: Profile) -> Self {
        Self {
            profile,
            cacheable: true,
        }
    }

    /// A transient failure: not found, retry later.
    #[must_use]
    pub fn transient() -> Self {
        Self {
            profile: Profile::not_found(),
            cacheable: false,
        }
    }
}

/// Raw profile fetch. Implementations classify their own failures.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Fetch the profile of an already normalized wallet.
    async fn fetch(&self, wallet: &str) -> Fetched;
}

/// Whether a response status should be retried later.
#[must_use]
pub const fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500..=599)
}

/// Profile service client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProfileSource {
    client: Client,
    base_url: String,
    bearer_token: Option<String>,
    user_agent: String,
    referer: String,
}

impl HttpProfileSource {
    /// Build a client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an HTTP error if the TLS backend cannot be initialized.
    pub fn new(config: &ProfileLookupConfig) -> IndexerResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                IndexerError::http("Failed to build profile client", None, Some(Box::new(e)))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token: config
                .bearer_token
                .clone()
                .filter(|token| !token.trim().is_empty()),
            user_agent: config.user_agent.clone(),
            referer: config.referer.clone(),
        })
    }

    /// Endpoint for `wallet`.
    #[must_use]
    pub fn url_for(&self, wallet: &str) -> String {
        format!("{}/{wallet}", self.base_url)
    }

    /// Perform the request and decode the JSON body.
    ///
    /// Transport failures, timeouts, and unparsable bodies carry no status.
    async fn request(&self, wallet: &str) -> IndexerResult<Value> {
        let mut request = self
            .client
            .get(self.url_for(wallet))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .header(REFERER, &self.referer);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "Profile request timed out"
            } else {
                "Profile request failed"
            };
            IndexerError::http(message, None, Some(Box::new(e)))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IndexerError::http(
                format!("Profile service responded {status}"),
                Some(status.as_u16()),
                None,
            ));
        }

        response.json::<Value>().await.map_err(|e| {
            IndexerError::http("Malformed profile response", None, Some(Box::new(e)))
        })
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    async fn fetch(&self, wallet: &str) -> Fetched {
        match self.request(wallet).await {
            Ok(body) => Fetched::cacheable(parse_profile(&body)),
            Err(err) => match err.http_status() {
                Some(status) if !is_transient_status(status) => {
                    Fetched::cacheable(Profile::not_found())
                }
                _ => {
                    warn!(wallet, error = %err, "profile lookup degraded");
                    Fetched::transient()
                }
            },
        }
    }
}

/// A positive integer given as a JSON number or numeric string.
fn positive_int(value: &Value) -> Option<u64> {
    let n = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (n > 0).then_some(n)
}

/// Avatar URL from `{season, tier, key}`, if all three are positive integers.
///
/// ```
/// use keyvault_indexer::profile::avatar_url;
/// use serde_json::json;
///
/// let avatar = json!({ "season": 2, "tier": 1, "key": 5 });
/// assert_eq!(
///     avatar_url(&avatar).as_deref(),
///     Some("https://abstract-assets.abs.xyz/avatars/2-1-5.png")
/// );
/// assert!(avatar_url(&json!({ "season": 0, "tier": 1, "key": 5 })).is_none());
/// ```
#[must_use]
pub fn avatar_url(avatar: &Value) -> Option<String> {
    let season = positive_int(avatar.get("season")?)?;
    let tier = positive_int(avatar.get("tier")?)?;
    let key = positive_int(avatar.get("key")?)?;
    Some(format!("{AVATAR_BASE_URL}/{season}-{tier}-{key}.png"))
}

fn trimmed_str<'a>(object: &'a serde_json::Map<String, Value>, field: &str) -> &'a str {
    object.get(field).and_then(Value::as_str).map_or("", str::trim)
}

/// Extract a [`Profile`] from a successful response body.
///
/// A missing or non-object `user` is treated as no profile. So is a user with
/// neither a name nor an image.
#[must_use]
pub fn parse_profile(body: &Value) -> Profile {
    let Some(user) = body.get("user").and_then(Value::as_object) else {
        return Profile::not_found();
    };

    let name = trimmed_str(user, "name");
    let override_url = trimmed_str(user, "overrideProfilePictureUrl");
    let image_url = if override_url.is_empty() {
        user.get("avatar").and_then(avatar_url).unwrap_or_default()
    } else {
        override_url.to_string()
    };

    if name.is_empty() && image_url.is_empty() {
        return Profile::not_found();
    }

    Profile {
        found: true,
        name: name.to_string(),
        image_url,
        verification: trimmed_str(user, "verification").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_avatar_coordinates_build_url() {
        let body = json!({
            "user": { "name": "alice", "avatar": { "season": 2, "tier": 1, "key": 5 } }
        });
        let profile = parse_profile(&body);
        assert!(profile.found);
        assert_eq!(
            profile.image_url,
            "https://abstract-assets.abs.xyz/avatars/2-1-5.png"
        );
    }

    #[test]
    fn test_override_url_wins() {
        let body = json!({
            "user": {
                "name": "alice",
                "overrideProfilePictureUrl": "https://cdn.example/a.png",
                "avatar": { "season": 2, "tier": 1, "key": 5 }
            }
        });
        assert_eq!(parse_profile(&body).image_url, "https://cdn.example/a.png");
    }

    #[test]
    fn test_blank_override_falls_back_to_avatar() {
        let body = json!({
            "user": {
                "overrideProfilePictureUrl": "  ",
                "avatar": { "season": "3", "tier": "2", "key": "9" }
            }
        });
        let profile = parse_profile(&body);
        assert!(profile.found);
        assert_eq!(
            profile.image_url,
            "https://abstract-assets.abs.xyz/avatars/3-2-9.png"
        );
    }

    #[test]
    fn test_invalid_avatar_coordinates_give_no_image() {
        for avatar in [
            json!({ "season": 2, "tier": 0, "key": 5 }),
            json!({ "season": -1, "tier": 1, "key": 5 }),
            json!({ "season": 1.5, "tier": 1, "key": 5 }),
            json!({ "season": 2, "tier": 1 }),
            json!("2-1-5"),
        ] {
            assert!(avatar_url(&avatar).is_none(), "{avatar}");
        }
    }

    #[test]
    fn test_name_is_trimmed() {
        let body = json!({ "user": { "name": "  bob  ", "verification": "verified" } });
        let profile = parse_profile(&body);
        assert_eq!(profile.name, "bob");
        assert_eq!(profile.verification, "verified");
        assert!(profile.image_url.is_empty());
    }

    #[test]
    fn test_empty_name_and_image_is_not_found() {
        let body = json!({ "user": { "name": " ", "verification": "verified" } });
        assert_eq!(parse_profile(&body), Profile::not_found());
    }

    #[test]
    fn test_missing_or_wrong_user_shape_is_not_found() {
        assert_eq!(parse_profile(&json!({})), Profile::not_found());
        assert_eq!(parse_profile(&json!({ "user": null })), Profile::not_found());
        assert_eq!(parse_profile(&json!({ "user": "alice" })), Profile::not_found());
        assert_eq!(parse_profile(&json!([1, 2])), Profile::not_found());
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(500));
        assert!(is_transient_status(503));
        assert!(!is_transient_status(404));
        assert!(!is_transient_status(400));
        assert!(!is_transient_status(401));
    }

    #[test]
    fn test_url_for_strips_trailing_slash() {
        let source = HttpProfileSource::new(&ProfileLookupConfig {
            base_url: "http://127.0.0.1:1/api/user/address/".to_string(),
            ..ProfileLookupConfig::default()
        })
        .unwrap();
        assert_eq!(
            source.url_for("0xabc"),
            "http://127.0.0.1:1/api/user/address/0xabc"
        );
    }
}
