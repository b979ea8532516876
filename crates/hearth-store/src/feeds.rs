//! Feed items and their fan-out to profile feeds.

use hearth_shared::{
    EntityKind, FeedItemId, FeedScope, Page, Paginated, ProfileId, RequestContext,
};
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::FeedItem;
use crate::sql::{conversion_error, encode_ts, missing, ts_at};

const FEED_ITEM_COLUMNS: &str = "fi.id, fi.is_public, fi.item_type, fi.item_id, fi.created_at";

impl Database {
    /// Record that `item_kind`/`item_id` happened and add it to the feed of
    /// every profile in `audience`.  Duplicate audience entries are ignored.
    pub fn publish_feed_item(
        &self,
        ctx: &RequestContext,
        item_kind: EntityKind,
        item_id: i64,
        is_public: bool,
        audience: &[ProfileId],
    ) -> Result<FeedItem> {
        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO feed_items (is_public, item_type, item_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![is_public as i32, item_kind.as_str(), item_id, encode_ts(&ctx.now)],
        )?;
        let id = FeedItemId(tx.last_insert_rowid());
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO feeds (profile_id, feed_item_id) VALUES (?1, ?2)",
            )?;
            for profile in audience {
                stmt.execute(params![profile.0, id.0])?;
            }
        }
        tx.commit()?;

        tracing::debug!(
            feed_item_id = %id,
            kind = %item_kind,
            fan_out = audience.len(),
            "published feed item"
        );
        self.get_feed_item(id)
    }

    pub fn get_feed_item(&self, id: FeedItemId) -> Result<FeedItem> {
        self.conn()
            .query_row(
                &format!("SELECT {FEED_ITEM_COLUMNS} FROM feed_items fi WHERE fi.id = ?1"),
                params![id.0],
                row_to_feed_item,
            )
            .map_err(missing(EntityKind::FeedItem, id.0))
    }

    /// The feed of `profile`, newest first.
    pub fn feed_items(
        &self,
        profile: ProfileId,
        scope: FeedScope,
        page: Page,
    ) -> Result<Paginated<FeedItem>> {
        let filter = match scope {
            FeedScope::All => "",
            FeedScope::Public => " AND fi.is_public = 1",
            FeedScope::Private => " AND fi.is_public = 0",
        };

        let total: i64 = self.conn().query_row(
            &format!(
                "SELECT COUNT(*) FROM feeds f
                 JOIN feed_items fi ON fi.id = f.feed_item_id
                 WHERE f.profile_id = ?1{filter}"
            ),
            params![profile.0],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {FEED_ITEM_COLUMNS} FROM feeds f
             JOIN feed_items fi ON fi.id = f.feed_item_id
             WHERE f.profile_id = ?1{filter}
             ORDER BY fi.created_at DESC, fi.id DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(
            params![profile.0, page.limit(), page.offset()],
            row_to_feed_item,
        )?;
        let items = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Paginated::new(items, page, total as u64))
    }

    /// Ids of the items currently in the feed of `profile`.
    pub(crate) fn feed_item_ids_for(&self, profile: ProfileId) -> Result<Vec<FeedItemId>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT feed_item_id FROM feeds WHERE profile_id = ?1")?;
        let rows = stmt.query_map(params![profile.0], |row| row.get(0).map(FeedItemId))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Remove those of `candidates` that no feed refers to any more.
    pub(crate) fn purge_orphan_feed_items(&self, candidates: &[FeedItemId]) -> Result<u64> {
        let mut stmt = self.conn().prepare(
            "DELETE FROM feed_items
             WHERE id = ?1 AND NOT EXISTS (SELECT 1 FROM feeds WHERE feed_item_id = ?1)",
        )?;
        let mut removed = 0;
        for id in candidates {
            removed += stmt.execute(params![id.0])?;
        }
        if removed > 0 {
            tracing::debug!(removed, "purged orphan feed items");
        }
        Ok(removed as u64)
    }
}

fn row_to_feed_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<FeedItem> {
    let is_public: i32 = row.get(1)?;
    let raw_kind: String = row.get(2)?;
    let item_kind = raw_kind
        .parse::<EntityKind>()
        .map_err(|e| conversion_error(2, e))?;
    Ok(FeedItem {
        id: FeedItemId(row.get(0)?),
        is_public: is_public != 0,
        item_kind,
        item_id: row.get(3)?,
        created_at: ts_at(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::profiles::NewProfile;

    fn profile(db: &Database, email: &str) -> ProfileId {
        db.create_profile(
            &RequestContext::anonymous(),
            NewProfile {
                email: email.into(),
                ..NewProfile::default()
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn fan_out_and_scopes() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a@x.com");
        let b = profile(&db, "b@x.com");
        let t0 = Utc::now();

        let public = db
            .publish_feed_item(
                &RequestContext::anonymous().at(t0),
                EntityKind::Blog,
                1,
                true,
                &[a, b, a],
            )
            .unwrap();
        let private = db
            .publish_feed_item(
                &RequestContext::anonymous().at(t0 + Duration::seconds(1)),
                EntityKind::Comment,
                2,
                false,
                &[a],
            )
            .unwrap();

        let all = db.feed_items(a, FeedScope::All, Page::default()).unwrap();
        assert_eq!(all.items, vec![private.clone(), public.clone()]);

        let only_public = db.feed_items(a, FeedScope::Public, Page::default()).unwrap();
        assert_eq!(only_public.items, vec![public.clone()]);
        let only_private = db.feed_items(a, FeedScope::Private, Page::default()).unwrap();
        assert_eq!(only_private.items, vec![private]);

        let b_feed = db.feed_items(b, FeedScope::All, Page::default()).unwrap();
        assert_eq!(b_feed.total_entries, 1);
        assert_eq!(b_feed.items[0].item_kind, EntityKind::Blog);
    }

    #[test]
    fn orphans_are_purged() {
        let db = Database::open_in_memory().unwrap();
        let a = profile(&db, "a@x.com");
        let b = profile(&db, "b@x.com");
        let ctx = RequestContext::anonymous();

        let only_a = db.publish_feed_item(&ctx, EntityKind::Photo, 1, true, &[a]).unwrap();
        let shared = db.publish_feed_item(&ctx, EntityKind::Photo, 2, true, &[a, b]).unwrap();
        let unrelated = db.publish_feed_item(&ctx, EntityKind::Photo, 3, true, &[]).unwrap();

        let mut ids = db.feed_item_ids_for(a).unwrap();
        ids.sort();
        assert_eq!(ids, vec![only_a.id, shared.id]);

        db.delete_profile(a).unwrap();
        assert!(db.get_feed_item(only_a.id).unwrap_err().is_not_found());
        assert_eq!(db.get_feed_item(shared.id).unwrap(), shared);
        // Never in a's feed, so not a's to purge.
        assert_eq!(db.get_feed_item(unrelated.id).unwrap(), unrelated);

        assert_eq!(db.purge_orphan_feed_items(&[unrelated.id]).unwrap(), 1);
        assert!(db.get_feed_item(unrelated.id).unwrap_err().is_not_found());
    }
}
