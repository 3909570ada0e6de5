//! Paging and sorting types for the admin user directory.

use serde::{Deserialize, Serialize};

use super::profile::Profile;

/// Column the directory is sorted by.
///
/// Serialized with the backend's column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortKey {
    #[serde(rename = "displayName")]
    DisplayName,
    #[serde(rename = "role")]
    Role,
    #[default]
    #[serde(rename = "created_at")]
    CreatedAt,
}

impl SortKey {
    /// Every key, in the order the console offers them.
    pub const ALL: [Self; 3] = [Self::CreatedAt, Self::DisplayName, Self::Role];

    /// Backend column name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DisplayName => "displayName",
            Self::Role => "role",
            Self::CreatedAt => "created_at",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DisplayName => "Name",
            Self::Role => "Role",
            Self::CreatedAt => "Created",
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "displayName" => Ok(Self::DisplayName),
            "role" => Ok(Self::Role),
            "created_at" => Ok(Self::CreatedAt),
            _ => Err(format!("invalid sort key: {s}")),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// The opposite direction.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("invalid sort order: {s}")),
        }
    }
}

/// Parameters of a single directory page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
}

impl PageRequest {
    /// Number of records before the first one on this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Number of pages needed for `total_count` records, `ceil(total / size)`.
///
/// A zero page size yields zero pages.
#[must_use]
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    u32::try_from(total_count.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
}

/// The directory view: current paging/sorting state and the profiles on
/// the current page.
///
/// `total_count` comes from the backend's count endpoint and is independent
/// of `items.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryPage {
    pub page: u32,
    pub page_size: u32,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
    pub total_count: u64,
    pub items: Vec<Profile>,
}

impl DirectoryPage {
    #[must_use]
    pub fn total_pages(&self) -> u32 {
        total_pages(self.total_count, self.page_size)
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}
