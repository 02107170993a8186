//! Avatar provisioning for new accounts.
//!
//! Lookups are best-effort: [`resolve_avatar`] turns any provider failure into
//! [`AvatarOutcome::NoImage`] so account creation never depends on the remote service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use md5::{Digest, Md5};
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::config::AvatarConfig;

/// Source of profile image URLs keyed by email.
#[async_trait]
pub trait AvatarProvider: Send + Sync {
    async fn image_url(&self, email: &str) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarOutcome {
    Image(String),
    NoImage,
}

impl AvatarOutcome {
    #[must_use]
    pub fn into_url(self) -> Option<String> {
        match self {
            Self::Image(url) => Some(url),
            Self::NoImage => None,
        }
    }
}

pub async fn resolve_avatar(provider: &dyn AvatarProvider, email: &str) -> AvatarOutcome {
    match provider.image_url(email).await {
        Ok(url) => {
            debug!("Resolved avatar for {}: {}", email, url);
            AvatarOutcome::Image(url)
        }
        Err(e) => {
            warn!("Avatar lookup failed for {}: {:#}", email, e);
            metrics::counter!("account_avatar_lookup_failures_total").increment(1);
            AvatarOutcome::NoImage
        }
    }
}

/// Builds the provider described by `config`, or `None` when avatars are disabled.
pub fn provider_from_config(config: &AvatarConfig) -> Result<Option<Arc<dyn AvatarProvider>>> {
    if !config.enabled {
        return Ok(None);
    }

    let provider = GravatarProvider::new(config)?;
    Ok(Some(Arc::new(provider)))
}

#[derive(Clone)]
pub struct GravatarProvider {
    client: Client,
    base_url: String,
    size: u32,
    default_image: String,
    rating: String,
    verify: bool,
}

impl GravatarProvider {
    pub fn new(config: &AvatarConfig) -> Result<Self> {
        Url::parse(&config.base_url).context("Invalid Gravatar base URL")?;

        let client = Client::builder()
            .user_agent("account-store/0.1")
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to build Gravatar HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            size: config.size,
            default_image: config.default_image.clone(),
            rating: config.rating.clone(),
            verify: config.verify,
        })
    }

    /// Gravatar identifies an email by the md5 of its trimmed, lowercased form.
    #[must_use]
    pub fn email_hash(email: &str) -> String {
        let digest = Md5::digest(email.trim().to_lowercase().as_bytes());
        format!("{digest:x}")
    }

    pub fn build_url(&self, email: &str) -> Result<Url> {
        self.url_with_default(email, &self.default_image)
    }

    fn url_with_default(&self, email: &str, default_image: &str) -> Result<Url> {
        if email.trim().is_empty() {
            anyhow::bail!("Cannot build a Gravatar URL for an empty email");
        }

        let hash = Self::email_hash(email);
        let mut url = Url::parse(&format!("{}/{hash}", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("s", &self.size.to_string())
            .append_pair("d", default_image)
            .append_pair("r", &self.rating);

        Ok(url)
    }

    async fn has_image(&self, email: &str) -> Result<()> {
        let check_url = self.url_with_default(email, "404")?;
        self.client
            .head(check_url)
            .send()
            .await
            .context("Gravatar request failed")?
            .error_for_status()
            .context("No Gravatar image for email")?;
        Ok(())
    }
}

#[async_trait]
impl AvatarProvider for GravatarProvider {
    async fn image_url(&self, email: &str) -> Result<String> {
        if self.verify {
            self.has_image(email).await?;
        }

        Ok(self.build_url(email)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;

    #[async_trait]
    impl AvatarProvider for FailingProvider {
        async fn image_url(&self, _email: &str) -> Result<String> {
            anyhow::bail!("provider unreachable")
        }
    }

    fn gravatar() -> GravatarProvider {
        GravatarProvider::new(&AvatarConfig::default()).unwrap()
    }

    fn verifying_gravatar(base_url: String) -> GravatarProvider {
        GravatarProvider::new(&AvatarConfig {
            base_url,
            verify: true,
            request_timeout_seconds: 5,
            ..AvatarConfig::default()
        })
        .unwrap()
    }

    /// Local stand-in for Gravatar. Requests without the `d=404` fallback get 400.
    async fn spawn_avatar_server(found: bool) -> String {
        use axum::{extract::RawQuery, http::StatusCode, routing::any};

        let app = axum::Router::new().route(
            "/avatar/{hash}",
            any(move |RawQuery(query): RawQuery| async move {
                let asks_for_404 = query.as_deref().is_some_and(|q| q.contains("d=404"));
                if !asks_for_404 {
                    StatusCode::BAD_REQUEST
                } else if found {
                    StatusCode::OK
                } else {
                    StatusCode::NOT_FOUND
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{addr}/avatar")
    }

    #[test]
    fn test_email_hash_normalizes_case_and_whitespace() {
        let expected = "0bc83cb571cd1c50ba6f3e8a78ef1346";
        assert_eq!(GravatarProvider::email_hash("myemailaddress@example.com"), expected);
        assert_eq!(
            GravatarProvider::email_hash("  MyEmailAddress@example.com "),
            expected
        );
    }

    #[test]
    fn test_build_url_includes_options() {
        let url = gravatar().build_url("MyEmailAddress@example.com").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.gravatar.com/avatar/0bc83cb571cd1c50ba6f3e8a78ef1346?s=200&d=identicon&r=g"
        );
    }

    #[test]
    fn test_build_url_tolerates_trailing_slash() {
        let config = AvatarConfig {
            base_url: "https://avatars.example.org/avatar/".to_string(),
            ..AvatarConfig::default()
        };
        let provider = GravatarProvider::new(&config).unwrap();
        let url = provider.build_url("a@x.com").unwrap();
        assert!(url.as_str().starts_with("https://avatars.example.org/avatar/"));
        assert!(!url.path().contains("//"));
    }

    #[test]
    fn test_build_url_rejects_empty_email() {
        assert!(gravatar().build_url("   ").is_err());
    }

    #[test]
    fn test_provider_from_config_respects_enabled_flag() {
        let config = AvatarConfig {
            enabled: false,
            ..AvatarConfig::default()
        };
        assert!(provider_from_config(&config).unwrap().is_none());
        assert!(provider_from_config(&AvatarConfig::default()).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_resolve_avatar_returns_image() {
        let outcome = resolve_avatar(&gravatar(), "a@x.com").await;
        match outcome {
            AvatarOutcome::Image(url) => assert!(url.contains(&GravatarProvider::email_hash("a@x.com"))),
            AvatarOutcome::NoImage => panic!("expected an image"),
        }
    }

    #[tokio::test]
    async fn test_verify_keeps_configured_default_when_image_exists() {
        let provider = verifying_gravatar(spawn_avatar_server(true).await);

        let outcome = resolve_avatar(&provider, "a@x.com").await;
        let AvatarOutcome::Image(url) = outcome else {
            panic!("expected an image");
        };
        assert!(url.contains(&GravatarProvider::email_hash("a@x.com")));
        assert!(url.contains("d=identicon"));
        assert!(!url.contains("d=404"));
    }

    #[tokio::test]
    async fn test_verify_missing_image_gives_no_avatar() {
        let provider = verifying_gravatar(spawn_avatar_server(false).await);

        assert!(provider.image_url("a@x.com").await.is_err());
        assert_eq!(
            resolve_avatar(&provider, "a@x.com").await,
            AvatarOutcome::NoImage
        );
    }

    #[tokio::test]
    async fn test_verify_unreachable_service_gives_no_avatar() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = verifying_gravatar(format!("http://{addr}/avatar"));
        assert_eq!(
            resolve_avatar(&provider, "a@x.com").await,
            AvatarOutcome::NoImage
        );
    }

    #[tokio::test]
    async fn test_resolve_avatar_swallows_failures() {
        let outcome = resolve_avatar(&FailingProvider, "a@x.com").await;
        assert_eq!(outcome, AvatarOutcome::NoImage);
        assert_eq!(outcome.into_url(), None);
    }
}
