//! Photo records.  Only metadata is stored; the image itself belongs to the
//! attachment service.

use hearth_shared::{AttachmentMeta, EntityKind, PhotoId, ProfileId, RequestContext};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Photo;
use crate::sql::{blank_to_none, encode_ts, missing, opt_ts_at, ts_at};

const PHOTO_COLUMNS: &str = "id, profile_id, caption, image_file_name, image_content_type, \
     image_file_size, image_updated_at, created_at";

impl Database {
    pub fn add_photo(
        &self,
        ctx: &RequestContext,
        profile_id: ProfileId,
        caption: Option<String>,
        image: Option<&AttachmentMeta>,
    ) -> Result<Photo> {
        self.get_profile(profile_id)?;
        self.conn().execute(
            "INSERT INTO photos (profile_id, caption, image_file_name, image_content_type,
                                 image_file_size, image_updated_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                profile_id.0,
                blank_to_none(caption),
                image.map(|m| m.file_name.as_str()),
                image.map(|m| m.content_type.as_str()),
                image.map(|m| m.file_size),
                image.map(|m| encode_ts(&m.updated_at)),
                encode_ts(&ctx.now),
            ],
        )?;

        let photo = self.get_photo(PhotoId(self.conn().last_insert_rowid()))?;
        tracing::info!(photo_id = %photo.id, profile_id = %profile_id, "added photo");
        Ok(photo)
    }

    pub fn get_photo(&self, id: PhotoId) -> Result<Photo> {
        self.conn()
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1"),
                params![id.0],
                row_to_photo,
            )
            .map_err(missing(EntityKind::Photo, id.0))
    }

    /// Newest first.
    pub fn photos_for_profile(&self, profile_id: ProfileId) -> Result<Vec<Photo>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos
             WHERE profile_id = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![profile_id.0], row_to_photo)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn delete_photo(&self, id: PhotoId) -> Result<()> {
        let affected = self
            .conn()
            .execute("DELETE FROM photos WHERE id = ?1", params![id.0])?;
        if affected == 0 {
            return Err(StoreError::not_found(EntityKind::Photo, id.0));
        }
        tracing::info!(photo_id = %id, "deleted photo");
        Ok(())
    }
}

fn row_to_photo(row: &rusqlite::Row<'_>) -> rusqlite::Result<Photo> {
    let created_at = ts_at(row, 7)?;
    let image = match row.get::<_, Option<String>>(3)? {
        Some(file_name) => Some(AttachmentMeta {
            file_name,
            content_type: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            file_size: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
            updated_at: opt_ts_at(row, 6)?.unwrap_or(created_at),
        }),
        None => None,
    };
    Ok(Photo {
        id: PhotoId(row.get(0)?),
        profile_id: ProfileId(row.get(1)?),
        caption: row.get(2)?,
        image,
        created_at,
    })
}
