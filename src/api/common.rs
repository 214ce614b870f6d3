//! Common API utilities and shared types

use crate::api::middleware::ApiError;

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size for admin listings
pub fn default_per_page() -> u32 {
    20
}

/// Parse an optional enum-valued query parameter, treating "" and "all" as unset
pub fn parse_filter<T: std::str::FromStr<Err = String>>(
    value: Option<&str>,
) -> Result<Option<T>, ApiError> {
    match value.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(ApiError::validation_error),
    }
}
