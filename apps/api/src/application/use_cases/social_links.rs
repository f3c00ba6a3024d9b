use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::validators::{is_valid_email, normalize_url},
    domain::entities::social_link::{SocialLink, SocialPlatform, sort_for_display},
};

#[async_trait]
pub trait SocialLinkRepo: Send + Sync {
    async fn list_social_links(&self, user_id: Uuid) -> AppResult<Vec<SocialLink>>;

    /// One link per (user, platform); an existing one gets the new url.
    async fn upsert_social_link(
        &self,
        user_id: Uuid,
        platform: SocialPlatform,
        url: &str,
    ) -> AppResult<SocialLink>;

    /// Returns false when the user had no link for `platform`.
    async fn delete_social_link(&self, user_id: Uuid, platform: SocialPlatform) -> AppResult<bool>;
}

/// `email` takes an address and is stored as `mailto:`; everything else is a web URL.
pub fn normalize_social_url(platform: SocialPlatform, input: &str) -> AppResult<String> {
    let input = input.trim();
    if platform.takes_email() {
        let address = input.strip_prefix("mailto:").unwrap_or(input);
        if !is_valid_email(address) {
            return Err(AppError::InvalidInput("Invalid email address".into()));
        }
        return Ok(format!("mailto:{}", address.to_lowercase()));
    }
    normalize_url(input).ok_or_else(|| AppError::InvalidInput("Invalid URL".into()))
}

#[derive(Clone)]
pub struct SocialLinkUseCases {
    repo: Arc<dyn SocialLinkRepo>,
}

impl SocialLinkUseCases {
    pub fn new(repo: Arc<dyn SocialLinkRepo>) -> Self {
        Self { repo }
    }

    pub async fn list_social_links(&self, user_id: Uuid) -> AppResult<Vec<SocialLink>> {
        let mut links = self.repo.list_social_links(user_id).await?;
        sort_for_display(&mut links);
        Ok(links)
    }

    #[instrument(skip(self))]
    pub async fn upsert_social_link(
        &self,
        user_id: Uuid,
        platform: SocialPlatform,
        url: &str,
    ) -> AppResult<SocialLink> {
        let url = normalize_social_url(platform, url)?;
        self.repo.upsert_social_link(user_id, platform, &url).await
    }

    #[instrument(skip(self))]
    pub async fn delete_social_link(&self, user_id: Uuid, platform: SocialPlatform) -> AppResult<()> {
        if !self.repo.delete_social_link(user_id, platform).await? {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::InMemoryPersistence;

    #[test]
    fn test_normalize_social_url() {
        assert_eq!(
            normalize_social_url(SocialPlatform::Email, "Me@Example.com").unwrap(),
            "mailto:me@example.com"
        );
        assert_eq!(
            normalize_social_url(SocialPlatform::Email, "mailto:me@example.com").unwrap(),
            "mailto:me@example.com"
        );
        assert!(normalize_social_url(SocialPlatform::Email, "https://example.com").is_err());
        assert_eq!(
            normalize_social_url(SocialPlatform::Github, "github.com/ana").unwrap(),
            "https://github.com/ana"
        );
        assert!(normalize_social_url(SocialPlatform::Github, "ana@example.com x").is_err());
    }

    #[tokio::test]
    async fn upsert_replaces_and_lists_in_display_order() {
        let persistence = Arc::new(InMemoryPersistence::new());
        let social = SocialLinkUseCases::new(persistence);
        let user_id = Uuid::new_v4();

        social
            .upsert_social_link(user_id, SocialPlatform::Website, "ana.dev")
            .await
            .unwrap();
        social
            .upsert_social_link(user_id, SocialPlatform::Instagram, "instagram.com/old")
            .await
            .unwrap();
        social
            .upsert_social_link(user_id, SocialPlatform::Instagram, "instagram.com/new")
            .await
            .unwrap();

        let links = social.list_social_links(user_id).await.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].platform, SocialPlatform::Instagram);
        assert_eq!(links[0].url, "https://instagram.com/new");
        assert_eq!(links[1].platform, SocialPlatform::Website);
    }

    #[tokio::test]
    async fn delete_missing_platform_is_not_found() {
        let persistence = Arc::new(InMemoryPersistence::new());
        let social = SocialLinkUseCases::new(persistence);
        assert!(matches!(
            social
                .delete_social_link(Uuid::new_v4(), SocialPlatform::X)
                .await,
            Err(AppError::NotFound)
        ));
    }
}
