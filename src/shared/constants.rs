/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

/// Window used by the "recent uploads" statistic
pub const RECENT_UPLOAD_WINDOW_DAYS: i64 = 7;

/// Maximum length for display names and search terms
pub const MAX_NAME_LENGTH: usize = 255;
