/// Application name
pub const APP_NAME: &str = "Hearth";

/// Default number of rows per page for paginated listings
pub const DEFAULT_PER_PAGE: u32 = 40;

/// Upper bound on a caller-supplied page size
pub const MAX_PER_PAGE: u32 = 200;

/// Shown in place of a blank profile location
pub const NOWHERE: &str = "Nowhere";

/// Shown as the name of a profile whose user account no longer exists
pub const DELETED_USER: &str = "Deleted user";

/// Time zone used when a profile has not picked one
pub const DEFAULT_TIME_ZONE: &str = "UTC";

/// Accepted length of a profile email address (inclusive)
pub const EMAIL_MIN_LEN: usize = 3;
pub const EMAIL_MAX_LEN: usize = 100;

/// Accepted length of a user login (inclusive)
pub const LOGIN_MIN_LEN: usize = 3;
pub const LOGIN_MAX_LEN: usize = 40;

/// Maximum number of results requested from the photo search service
pub const PHOTO_SEARCH_PAGE_SIZE: usize = 20;

/// Shortest word prefix the full-text indexer will match on
pub const SEARCH_MIN_PREFIX_LEN: usize = 3;

/// Default avatar URL template, interpolated with the style name
pub const DEFAULT_AVATAR_URL: &str = "/avatar_default_:style.png";
