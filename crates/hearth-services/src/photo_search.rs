//! Third-party photo search, used to show a profile's public photos.
//!
//! The remote service is optional decoration: [`search_photos`] turns
//! every failure and every timeout into an empty result.  [`StoredPhotos`]
//! answers the same queries from the store's own photo records.

use std::future::Future;
use std::time::Duration;

use hearth_shared::constants::PHOTO_SEARCH_PAGE_SIZE;
use hearth_shared::ProfileId;
use hearth_store::{Database, Photo};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoResult {
    pub title: String,
    pub page_url: String,
    pub thumbnail_url: String,
}

/// Search parameters.  Blank values are sent as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoQuery {
    pub user_name: Option<String>,
    pub tags: Option<String>,
    pub limit: usize,
}

impl PhotoQuery {
    pub fn new(user_name: Option<&str>, tags: Option<&str>) -> Self {
        let present = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            user_name: present(user_name),
            tags: present(tags),
            limit: PHOTO_SEARCH_PAGE_SIZE,
        }
    }
}

pub trait PhotoSearch: Send + Sync {
    fn search(&self, query: &PhotoQuery) -> impl Future<Output = Result<Vec<PhotoResult>>> + Send;
}

/// Run `query` against `client`, giving up after `timeout`.  Never fails.
pub async fn search_photos<C: PhotoSearch>(
    client: &C,
    query: &PhotoQuery,
    timeout: Duration,
) -> Vec<PhotoResult> {
    let limit = query.limit.min(PHOTO_SEARCH_PAGE_SIZE);
    match tokio::time::timeout(timeout, client.search(query)).await {
        Ok(Ok(mut photos)) => {
            photos.truncate(limit);
            photos
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "photo search failed");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "photo search timed out");
            Vec::new()
        }
    }
}

/// A profile's photo records, searched by caption.  Every tag in the
/// query has to occur in the caption.
#[derive(Debug, Clone, Default)]
pub struct StoredPhotos {
    base_url: String,
    photos: Vec<Photo>,
}

impl StoredPhotos {
    pub fn for_profile(db: &Database, base_url: &str, profile: ProfileId) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            photos: db.photos_for_profile(profile)?,
        })
    }

    fn result(&self, photo: &Photo) -> PhotoResult {
        let page_url = format!("{}/photos/{}", self.base_url, photo.id);
        let thumbnail_url = match &photo.image {
            Some(meta) => format!("{page_url}/small/{}", meta.file_name),
            None => format!("{page_url}/small/missing.png"),
        };
        PhotoResult {
            title: photo
                .caption
                .clone()
                .unwrap_or_else(|| format!("Photo {}", photo.id)),
            page_url,
            thumbnail_url,
        }
    }
}

impl PhotoSearch for StoredPhotos {
    async fn search(&self, query: &PhotoQuery) -> Result<Vec<PhotoResult>> {
        let tags: Vec<String> = query
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();
        Ok(self
            .photos
            .iter()
            .filter(|photo| {
                let caption = photo.caption.as_deref().unwrap_or_default().to_lowercase();
                tags.iter().all(|tag| caption.contains(tag.as_str()))
            })
            .map(|photo| self.result(photo))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use hearth_shared::RequestContext;
    use hearth_store::profiles::NewProfile;

    enum Fake {
        Photos(usize),
        Broken,
        Slow,
    }

    impl PhotoSearch for Fake {
        async fn search(&self, _query: &PhotoQuery) -> Result<Vec<PhotoResult>> {
            match self {
                Fake::Photos(n) => Ok((0..*n)
                    .map(|i| PhotoResult {
                        title: format!("photo {i}"),
                        page_url: format!("https://photos.example.org/{i}"),
                        thumbnail_url: format!("https://photos.example.org/{i}_t.jpg"),
                    })
                    .collect()),
                Fake::Broken => Err(ServiceError::Search("503".into())),
                Fake::Slow => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    #[test]
    fn blank_parameters_are_absent() {
        let q = PhotoQuery::new(Some("  "), Some("sunset"));
        assert_eq!(q.user_name, None);
        assert_eq!(q.tags.as_deref(), Some("sunset"));
        assert_eq!(q.limit, 20);
    }

    #[tokio::test]
    async fn results_are_capped() {
        let q = PhotoQuery::new(Some("ada"), None);
        let photos = search_photos(&Fake::Photos(50), &q, Duration::from_secs(1)).await;
        assert_eq!(photos.len(), 20);
    }

    #[tokio::test]
    async fn errors_become_empty() {
        let q = PhotoQuery::new(None, None);
        assert!(search_photos(&Fake::Broken, &q, Duration::from_secs(1))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn timeouts_become_empty() {
        let q = PhotoQuery::new(Some("ada"), None);
        assert!(search_photos(&Fake::Slow, &q, Duration::from_millis(50))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn stored_photos_match_caption_tags() {
        let db = Database::open_in_memory().unwrap();
        let ctx = RequestContext::anonymous();
        let profile = db
            .create_profile(
                &ctx,
                NewProfile {
                    email: "ada@example.org".into(),
                    ..NewProfile::default()
                },
            )
            .unwrap();
        db.add_photo(&ctx, profile.id, Some("Sunset over Oslo".into()), None)
            .unwrap();
        db.add_photo(&ctx, profile.id, Some("Breakfast".into()), None)
            .unwrap();

        let photos = StoredPhotos::for_profile(&db, "https://hearth.test/", profile.id).unwrap();
        let q = PhotoQuery::new(None, Some("sunset, oslo"));
        let found = search_photos(&photos, &q, Duration::from_secs(1)).await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Sunset over Oslo");
        assert!(found[0].page_url.starts_with("https://hearth.test/photos/"));

        let all = search_photos(&photos, &PhotoQuery::new(None, None), Duration::from_secs(1)).await;
        assert_eq!(all.len(), 2);
    }
}
