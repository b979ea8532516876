//! Subcommand implementations.  Each returns the JSON document `main`
//! prints.

use std::path::Path;
use std::sync::Arc;

use hearth_services::attachments::{attach_profile_icon, remove_profile_icon};
use hearth_services::mail::dispatch_detached;
use hearth_services::photo_search::search_photos;
use hearth_services::search_index::reindex_all;
use hearth_services::{
    ContactMessage, LogMailer, MemoryAttachments, MemoryIndex, PhotoQuery, SearchIndexer,
    StoredPhotos, Upload,
};
use hearth_shared::{Page, ProfileId, RequestContext};
use hearth_store::migrations::CURRENT_VERSION;
use hearth_store::{Database, Profile};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::AdminConfig;

#[derive(Debug, Serialize)]
struct ProfileSummary {
    id: ProfileId,
    name: String,
    param: String,
    is_active: bool,
}

fn summary(db: &Database, profile: &Profile) -> anyhow::Result<ProfileSummary> {
    Ok(ProfileSummary {
        id: profile.id,
        name: db.profile_full_name(profile)?,
        param: db.profile_param(profile)?,
        is_active: profile.is_active,
    })
}

fn summaries(db: &Database, profiles: &[Profile]) -> anyhow::Result<Vec<ProfileSummary>> {
    profiles.iter().map(|p| summary(db, p)).collect()
}

pub fn migrate(db: &Database) -> Value {
    json!({
        "path": db.path(),
        "schema_version": CURRENT_VERSION,
    })
}

pub fn featured(db: &Database) -> anyhow::Result<Value> {
    let featured = match db.featured_profile()? {
        Some(profile) => Some(summary(db, &profile)?),
        None => None,
    };
    Ok(json!({ "featured": featured }))
}

pub fn network(db: &Database, profile: ProfileId) -> anyhow::Result<Value> {
    let profile = db.get_profile(profile)?;
    Ok(json!({
        "profile": summary(db, &profile)?,
        "has_network": db.has_network(profile.id)?,
        "friends": summaries(db, &db.friends_of(profile.id)?)?,
        "followers": summaries(db, &db.followers_of(profile.id)?)?,
        "followings": summaries(db, &db.followings_of(profile.id)?)?,
        "unread_messages": db.unread_message_count(profile.id)?,
    }))
}

pub fn wall(
    db: &Database,
    config: &AdminConfig,
    a: ProfileId,
    b: ProfileId,
    page: u32,
) -> anyhow::Result<Value> {
    let comments = db.comments_between_page(a, b, Page::new(page, config.per_page))?;
    Ok(json!({
        "total_pages": comments.total_pages(),
        "comments": comments,
    }))
}

pub fn set_active(db: &Database, profile: ProfileId, active: bool) -> anyhow::Result<Value> {
    db.set_profile_active(profile, active)?;
    let profile = db.get_profile(profile)?;
    Ok(json!({ "profile": summary(db, &profile)? }))
}

pub fn delete_profile(db: &Database, profile: ProfileId) -> anyhow::Result<Value> {
    db.delete_profile(profile)?;
    tracing::info!(profile = %profile, "profile deleted");
    Ok(json!({ "deleted": profile }))
}

pub async fn contact(
    config: &AdminConfig,
    fields: Vec<(String, String)>,
) -> anyhow::Result<Value> {
    let message = fields
        .into_iter()
        .fold(ContactMessage::new(), |msg, (k, v)| msg.field(k, v));
    let mail = message.into_mail(&config.site_name, &config.contact_recipient);
    let subject = mail.subject.clone();

    // Wait for the task so the process does not exit before delivery.
    dispatch_detached(Arc::new(LogMailer), mail).await?;
    Ok(json!({ "to": config.contact_recipient, "subject": subject }))
}

pub fn search(db: &Database, query: &str) -> anyhow::Result<Value> {
    let mut index = MemoryIndex::new();
    let indexed = reindex_all(db, &mut index)?;
    let matches = index
        .search(query)
        .into_iter()
        .map(|id| db.get_profile(id))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({
        "indexed": indexed,
        "matches": summaries(db, &matches)?,
    }))
}

pub async fn photos(
    db: &Database,
    config: &AdminConfig,
    profile: ProfileId,
    tags: Option<&str>,
) -> anyhow::Result<Value> {
    let stored = StoredPhotos::for_profile(db, &config.site_url, profile)?;
    let query = PhotoQuery::new(None, tags);
    let photos = search_photos(&stored, &query, config.photo_search_timeout).await;
    Ok(json!({ "photos": photos }))
}

pub async fn set_icon(
    db: &Database,
    config: &AdminConfig,
    profile: ProfileId,
    file: Option<&Path>,
) -> anyhow::Result<Value> {
    let service = MemoryAttachments::new(config.site_url.as_str());
    let Some(file) = file else {
        remove_profile_icon(db, &service, profile).await?;
        return Ok(json!({ "profile": profile, "icon": null }));
    };

    let upload = Upload {
        file_name: file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "icon".to_string()),
        bytes: tokio::fs::read(file).await?,
    };
    let ctx = RequestContext::anonymous();
    let locations = attach_profile_icon(db, &service, &ctx, profile, &upload).await?;
    Ok(json!({ "profile": profile, "styles": locations }))
}

#[cfg(test)]
mod tests {
    use hearth_shared::CommentTarget;
    use hearth_store::comments::NewComment;
    use hearth_store::profiles::NewProfile;

    use super::*;

    fn profile(db: &Database, email: &str) -> Profile {
        db.create_profile(
            &RequestContext::anonymous(),
            NewProfile {
                email: email.into(),
                ..NewProfile::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn migrate_reports_schema_version() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(migrate(&db)["schema_version"], CURRENT_VERSION);
    }

    #[test]
    fn network_lists_friends() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a@x.com");
        let b = profile(&db, "b@x.com");
        let edge = db
            .request_friendship(&RequestContext::anonymous(), a.id, b.id)
            .unwrap();
        db.accept_friendship(&RequestContext::anonymous(), edge.id)
            .unwrap();

        let out = network(&db, a.id).unwrap();
        assert_eq!(out["has_network"], true);
        assert_eq!(out["friends"][0]["id"], b.id.0);
        assert_eq!(out["followers"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn wall_pages_with_configured_size() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a@x.com");
        let b = profile(&db, "b@x.com");
        for (author, target) in [(a.id, b.id), (b.id, a.id), (a.id, b.id)] {
            db.create_comment(
                &RequestContext::for_profile(author, None),
                NewComment {
                    target: CommentTarget::Profile(target),
                    body: "hi".into(),
                },
            )
            .unwrap();
        }
        let config = AdminConfig {
            per_page: 2,
            ..AdminConfig::default()
        };

        let out = wall(&db, &config, b.id, a.id, 1).unwrap();
        assert_eq!(out["total_pages"], 2);
        assert_eq!(out["comments"]["items"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn delete_profile_reports_missing_profile() {
        let db = Database::open_in_memory().unwrap();
        assert!(delete_profile(&db, ProfileId(99)).is_err());
    }

    #[tokio::test]
    async fn contact_uses_site_name() {
        let config = AdminConfig::default();
        let out = contact(&config, vec![("name".into(), "Ada".into())])
            .await
            .unwrap();
        assert_eq!(out["subject"], "from Hearth contact page");
    }
}
