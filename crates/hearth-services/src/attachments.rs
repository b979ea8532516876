//! Image attachments: upload validation, style geometry, and the storage
//! seam for derived images.
//!
//! An attachment is stored once per style.  A style is a name plus a
//! geometry string:
//!
//! - `"150x150#"` crops to exactly 150x150
//! - `"300x300>"` shrinks to fit inside 300x300, never enlarges
//! - `"100x100"`  scales to fit inside 100x100

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::io::Cursor;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use hearth_shared::constants::DEFAULT_AVATAR_URL;
use hearth_shared::{
    AttachmentMeta, EntityKind, ProfileId, RequestContext, RuleKind, ValidationErrors,
};
use hearth_store::Database;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, ServiceError};

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeMode {
    /// `#`: fill the box, cropping the overflow.
    Crop,
    /// `>`: fit inside the box, only if the image is larger.
    ShrinkOnly,
    /// no modifier: fit inside the box.
    Fit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub mode: ResizeMode,
}

impl Geometry {
    pub const fn crop(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            mode: ResizeMode::Crop,
        }
    }

    /// Render `img` at this geometry.
    pub fn apply(&self, img: &DynamicImage) -> DynamicImage {
        let (w, h) = img.dimensions();
        match self.mode {
            ResizeMode::Crop => img.resize_to_fill(self.width, self.height, FilterType::Lanczos3),
            ResizeMode::ShrinkOnly if w <= self.width && h <= self.height => img.clone(),
            ResizeMode::ShrinkOnly | ResizeMode::Fit => {
                img.resize(self.width, self.height, FilterType::Lanczos3)
            }
        }
    }
}

impl FromStr for Geometry {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (dims, mode) = match s.chars().last() {
            Some('#') => (&s[..s.len() - 1], ResizeMode::Crop),
            Some('>') => (&s[..s.len() - 1], ResizeMode::ShrinkOnly),
            _ => (s, ResizeMode::Fit),
        };

        let invalid = || ServiceError::Geometry(s.to_string());
        let (w, h) = dims.split_once('x').ok_or_else(invalid)?;
        let width: u32 = w.parse().map_err(|_| invalid())?;
        let height: u32 = h.parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self {
            width,
            height,
            mode,
        })
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.mode {
            ResizeMode::Crop => "#",
            ResizeMode::ShrinkOnly => ">",
            ResizeMode::Fit => "",
        };
        write!(f, "{}x{}{}", self.width, self.height, suffix)
    }
}

/// Named styles, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSet {
    styles: Vec<(String, Geometry)>,
}

impl StyleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a style from a geometry string such as `"300x300>"`.
    pub fn with(mut self, name: &str, geometry: &str) -> Result<Self> {
        self.styles.push((name.to_string(), geometry.parse()?));
        Ok(self)
    }

    pub fn with_geometry(mut self, name: &str, geometry: Geometry) -> Self {
        self.styles.push((name.to_string(), geometry));
        self
    }

    pub fn get(&self, name: &str) -> Option<Geometry> {
        self.styles
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, g)| *g)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Geometry)> {
        self.styles.iter().map(|(n, g)| (n.as_str(), g))
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// big / medium / small profile icons, all square crops.
pub fn profile_icon_styles() -> StyleSet {
    StyleSet::new()
        .with_geometry("big", Geometry::crop(150, 150))
        .with_geometry("medium", Geometry::crop(100, 100))
        .with_geometry("small", Geometry::crop(50, 50))
}

/// Location shown when no attachment exists: `:style` in the template is
/// replaced by the style name.
pub fn default_url(template: &str, style: &str) -> String {
    template.replace(":style", style)
}

pub fn default_avatar_url(style: &str) -> String {
    default_url(DEFAULT_AVATAR_URL, style)
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// An upload that decoded as an image.
#[derive(Debug, Clone)]
pub struct ValidatedImage {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub image: DynamicImage,
}

impl ValidatedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Reject anything that is not a decodable image.  Failures are reported on
/// `field` as a validation error.
pub fn validate_image(upload: &Upload, field: &str) -> Result<ValidatedImage> {
    let mut errors = ValidationErrors::new();
    if upload.bytes.is_empty() {
        errors.add(field, RuleKind::Presence, hearth_shared::validation::MSG_BLANK);
        return Err(errors.into());
    }

    let decoded = image::guess_format(&upload.bytes).and_then(|format| {
        image::load_from_memory_with_format(&upload.bytes, format).map(|img| (format, img))
    });
    match decoded {
        Ok((format, image)) => {
            let (width, height) = image.dimensions();
            Ok(ValidatedImage {
                format,
                width,
                height,
                image,
            })
        }
        Err(e) => {
            tracing::debug!(file = %upload.file_name, error = %e, "rejected upload");
            errors.add(field, RuleKind::Format, "is not a recognised image");
            Err(errors.into())
        }
    }
}

// ---------------------------------------------------------------------------
// Storage seam
// ---------------------------------------------------------------------------

/// The record an attachment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentOwner {
    pub kind: EntityKind,
    pub id: i64,
}

impl AttachmentOwner {
    pub fn profile_icon(id: ProfileId) -> Self {
        Self {
            kind: EntityKind::Profile,
            id: id.0,
        }
    }
}

impl fmt::Display for AttachmentOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str().to_lowercase(), self.id)
    }
}

/// Style name to stored location.
pub type StyleLocations = BTreeMap<String, String>;

pub trait AttachmentService: Send + Sync {
    /// Render and store every style of `image`, replacing anything stored
    /// for `owner` before.
    fn store(
        &self,
        owner: AttachmentOwner,
        file_name: &str,
        image: &ValidatedImage,
        styles: &StyleSet,
    ) -> impl Future<Output = Result<StyleLocations>> + Send;

    /// Remove every stored style of `owner`.
    fn clear(&self, owner: AttachmentOwner) -> impl Future<Output = Result<()>> + Send;
}

/// Validate then store.  Returns the metadata the owning record keeps.
pub async fn process_upload<S: AttachmentService>(
    service: &S,
    owner: AttachmentOwner,
    upload: &Upload,
    styles: &StyleSet,
    now: DateTime<Utc>,
) -> Result<(AttachmentMeta, StyleLocations)> {
    let image = validate_image(upload, "image")?;
    let locations = service
        .store(owner, &upload.file_name, &image, styles)
        .await?;

    tracing::info!(%owner, styles = locations.len(), "stored attachment");
    let meta = AttachmentMeta {
        file_name: upload.file_name.clone(),
        content_type: image.content_type().to_string(),
        file_size: upload.bytes.len() as i64,
        updated_at: now,
    };
    Ok((meta, locations))
}

/// Replace a profile's icon.  The profile must exist before anything is
/// stored.
pub async fn attach_profile_icon<S: AttachmentService>(
    db: &Database,
    service: &S,
    ctx: &RequestContext,
    profile_id: ProfileId,
    upload: &Upload,
) -> Result<StyleLocations> {
    db.get_profile(profile_id)?;
    let owner = AttachmentOwner::profile_icon(profile_id);
    let (meta, locations) =
        process_upload(service, owner, upload, &profile_icon_styles(), ctx.now).await?;
    db.set_profile_icon(profile_id, &meta)?;
    Ok(locations)
}

pub async fn remove_profile_icon<S: AttachmentService>(
    db: &Database,
    service: &S,
    profile_id: ProfileId,
) -> Result<()> {
    db.get_profile(profile_id)?;
    service
        .clear(AttachmentOwner::profile_icon(profile_id))
        .await?;
    db.clear_profile_icon(profile_id)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// In-process implementation
// ---------------------------------------------------------------------------

/// Keeps rendered PNGs in memory.  Locations are `{base_url}/{owner}/{style}/{file}`.
pub struct MemoryAttachments {
    base_url: String,
    stored: RwLock<HashMap<AttachmentOwner, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryAttachments {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            stored: RwLock::new(HashMap::new()),
        }
    }

    /// The rendered bytes of one style.
    pub async fn rendered(&self, owner: AttachmentOwner, style: &str) -> Option<Vec<u8>> {
        let stored = self.stored.read().await;
        stored.get(&owner).and_then(|styles| styles.get(style).cloned())
    }
}

impl AttachmentService for MemoryAttachments {
    async fn store(
        &self,
        owner: AttachmentOwner,
        file_name: &str,
        image: &ValidatedImage,
        styles: &StyleSet,
    ) -> Result<StyleLocations> {
        let source = image.image.clone();
        let jobs: Vec<(String, Geometry)> = styles
            .iter()
            .map(|(name, geometry)| (name.to_string(), *geometry))
            .collect();

        let rendered = tokio::task::spawn_blocking(move || -> Result<BTreeMap<String, Vec<u8>>> {
            let mut out = BTreeMap::new();
            for (name, geometry) in jobs {
                let mut buf = Cursor::new(Vec::new());
                geometry.apply(&source).write_to(&mut buf, ImageFormat::Png)?;
                out.insert(name, buf.into_inner());
            }
            Ok(out)
        })
        .await
        .map_err(|e| ServiceError::Storage(e.to_string()))??;

        let locations = rendered
            .keys()
            .map(|style| {
                (
                    style.clone(),
                    format!("{}/{owner}/{style}/{file_name}", self.base_url),
                )
            })
            .collect();
        self.stored.write().await.insert(owner, rendered);
        Ok(locations)
    }

    async fn clear(&self, owner: AttachmentOwner) -> Result<()> {
        self.stored.write().await.remove(&owner);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_store::profiles::NewProfile;
    use image::{ImageBuffer, Rgb};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(width, height, |x, _| Rgb([(x % 255) as u8, 0, 0]));
        let mut buf = Vec::new();
        let mut cursor = Cursor::new(&mut buf);
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();
        buf
    }

    fn dims(bytes: &[u8]) -> (u32, u32) {
        image::load_from_memory(bytes).unwrap().dimensions()
    }

    #[test]
    fn parses_geometry_strings() {
        assert_eq!("150x150#".parse::<Geometry>().unwrap(), Geometry::crop(150, 150));
        let shrink: Geometry = "300x200>".parse().unwrap();
        assert_eq!(shrink.mode, ResizeMode::ShrinkOnly);
        assert_eq!(shrink.to_string(), "300x200>");
        assert_eq!("64x32".parse::<Geometry>().unwrap().mode, ResizeMode::Fit);

        for bad in ["", "150", "0x10", "axb#", "10x"] {
            assert!(bad.parse::<Geometry>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn geometry_modes_render_expected_sizes() {
        let img = image::load_from_memory(&png(200, 100)).unwrap();
        assert_eq!(Geometry::crop(50, 50).apply(&img).dimensions(), (50, 50));

        let fit: Geometry = "100x100".parse().unwrap();
        assert_eq!(fit.apply(&img).dimensions(), (100, 50));

        let shrink: Geometry = "400x400>".parse().unwrap();
        assert_eq!(shrink.apply(&img).dimensions(), (200, 100));
    }

    #[test]
    fn profile_icon_styles_are_square_crops() {
        let styles = profile_icon_styles();
        let names: Vec<_> = styles.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["big", "medium", "small"]);
        assert_eq!(styles.get("medium"), Some(Geometry::crop(100, 100)));
        assert_eq!(default_avatar_url("small"), "/avatar_default_small.png");
    }

    #[test]
    fn non_images_fail_validation() {
        let upload = Upload {
            file_name: "notes.txt".into(),
            bytes: b"definitely not a picture".to_vec(),
        };
        let err = validate_image(&upload, "icon").unwrap_err();
        match err {
            ServiceError::Validation(errors) => assert!(errors.has("icon", RuleKind::Format)),
            other => panic!("unexpected error: {other:?}"),
        }

        let empty = Upload {
            file_name: "empty.png".into(),
            bytes: Vec::new(),
        };
        assert!(matches!(
            validate_image(&empty, "icon"),
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn stores_every_style() {
        let service = MemoryAttachments::new("https://cdn.example.org/");
        let owner = AttachmentOwner::profile_icon(ProfileId(4));
        let upload = Upload {
            file_name: "me.png".into(),
            bytes: png(300, 200),
        };

        let (meta, locations) =
            process_upload(&service, owner, &upload, &profile_icon_styles(), Utc::now())
                .await
                .unwrap();
        assert_eq!(meta.content_type, "image/png");
        assert_eq!(meta.file_size, upload.bytes.len() as i64);
        assert_eq!(
            locations.get("small").map(String::as_str),
            Some("https://cdn.example.org/profile/4/small/me.png")
        );

        let small = service.rendered(owner, "small").await.unwrap();
        assert_eq!(dims(&small), (50, 50));

        service.clear(owner).await.unwrap();
        assert!(service.rendered(owner, "big").await.is_none());
    }

    #[tokio::test]
    async fn profile_icon_round_trip_through_store() {
        let db = Database::open_in_memory().unwrap();
        let ctx = RequestContext::anonymous();
        let profile = db
            .create_profile(
                &ctx,
                NewProfile {
                    email: "pic@x.com".into(),
                    ..NewProfile::default()
                },
            )
            .unwrap();
        let service = MemoryAttachments::new("/system");
        let upload = Upload {
            file_name: "face.png".into(),
            bytes: png(120, 160),
        };

        let locations = attach_profile_icon(&db, &service, &ctx, profile.id, &upload)
            .await
            .unwrap();
        assert_eq!(locations.len(), 3);
        let icon = db.get_profile(profile.id).unwrap().icon.unwrap();
        assert_eq!(icon.file_name, "face.png");

        remove_profile_icon(&db, &service, profile.id).await.unwrap();
        assert!(db.get_profile(profile.id).unwrap().icon.is_none());
    }

    #[tokio::test]
    async fn missing_profile_stores_nothing() {
        let db = Database::open_in_memory().unwrap();
        let service = MemoryAttachments::new("/system");
        let upload = Upload {
            file_name: "face.png".into(),
            bytes: png(10, 10),
        };
        let err = attach_profile_icon(
            &db,
            &service,
            &RequestContext::anonymous(),
            ProfileId(77),
            &upload,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Store(ref e) if e.is_not_found()));
        assert!(service
            .rendered(AttachmentOwner::profile_icon(ProfileId(77)), "big")
            .await
            .is_none());
    }
}
