use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::Item;

/// Which items a list view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    #[default]
    All,
    Bought,
    NotBought,
}

impl FilterType {
    /// The required bought state, or `None` when every item passes.
    pub fn bought_state(&self) -> Option<bool> {
        match self {
            FilterType::All => None,
            FilterType::Bought => Some(true),
            FilterType::NotBought => Some(false),
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterType::All => write!(f, "all"),
            FilterType::Bought => write!(f, "bought"),
            FilterType::NotBought => write!(f, "not_bought"),
        }
    }
}

impl FromStr for FilterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "all" => Ok(FilterType::All),
            "bought" => Ok(FilterType::Bought),
            "not_bought" => Ok(FilterType::NotBought),
            _ => Err(format!(
                "Invalid filter '{}'. Valid options: all, bought, not_bought",
                s
            )),
        }
    }
}

/// List ordering by last update time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    DateAsc,
    #[default]
    DateDesc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::DateAsc => write!(f, "date_asc"),
            SortOrder::DateDesc => write!(f, "date_desc"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "date_asc" | "asc" => Ok(SortOrder::DateAsc),
            "date_desc" | "desc" => Ok(SortOrder::DateDesc),
            _ => Err(format!(
                "Invalid sort order '{}'. Valid options: date_asc, date_desc",
                s
            )),
        }
    }
}

/// Filter, sort and free-text search applied to a list view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub filter: FilterType,
    pub sort: SortOrder,
    pub search: String,
}

impl ListQuery {
    pub fn new(filter: FilterType, sort: SortOrder, search: impl Into<String>) -> Self {
        Self {
            filter,
            sort,
            search: search.into(),
        }
    }

    /// Trimmed search text, `None` if empty.
    pub fn search_term(&self) -> Option<&str> {
        let term = self.search.trim();
        if term.is_empty() {
            None
        } else {
            Some(term)
        }
    }

    /// True if the item passes the filter and matches the search text
    /// (case-insensitive substring of name or note).
    pub fn matches(&self, item: &Item) -> bool {
        if let Some(bought) = self.filter.bought_state() {
            if item.is_bought != bought {
                return false;
            }
        }

        match self.search_term() {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                item.name.to_lowercase().contains(&term)
                    || item
                        .note
                        .as_ref()
                        .is_some_and(|n| n.to_lowercase().contains(&term))
            }
        }
    }

    /// Orders items by `updated_at`, ties broken by id.
    pub fn compare(&self, a: &Item, b: &Item) -> Ordering {
        let by_date = a.updated_at.cmp(&b.updated_at).then_with(|| a.id.cmp(&b.id));
        match self.sort {
            SortOrder::DateAsc => by_date,
            SortOrder::DateDesc => by_date.reverse(),
        }
    }

    /// Applies filter, search and ordering to an in-memory collection.
    pub fn apply(&self, items: impl IntoIterator<Item = Item>) -> Vec<Item> {
        let mut result: Vec<Item> = items.into_iter().filter(|i| self.matches(i)).collect();
        result.sort_by(|a, b| self.compare(a, b));
        result
    }
}
