use std::collections::BTreeSet;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::{CatalogItem, ContentType};
use crate::error::{AppError, AppResult};

const EARLIEST_YEAR: i32 = 1900;
const MAX_RATING: f64 = 10.0;

/// Inclusive release-year window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.min..=self.max).contains(&year)
    }
}

impl Default for YearRange {
    /// Everything from 1900 through the current year
    fn default() -> Self {
        Self {
            min: EARLIEST_YEAR,
            max: chrono::Utc::now().year(),
        }
    }
}

/// Active filter configuration for a recommendation queue.
///
/// Replacing it resets the queue; there is no partial update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreferenceSet {
    pub genre_ids: BTreeSet<u32>,
    pub year_range: YearRange,
    pub min_rating: f64,
    pub provider_ids: BTreeSet<u32>,
    /// Providers exclude titles when set; otherwise they are advisory only
    pub availability_strict: bool,
    pub content_type: ContentType,
}

impl Default for PreferenceSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceSet {
    /// Creates preferences with no constraints
    pub fn new() -> Self {
        Self {
            genre_ids: BTreeSet::new(),
            year_range: YearRange::default(),
            min_rating: 0.0,
            provider_ids: BTreeSet::new(),
            availability_strict: false,
            content_type: ContentType::Movie,
        }
    }

    pub fn with_genres(mut self, genre_ids: impl IntoIterator<Item = u32>) -> Self {
        self.genre_ids = genre_ids.into_iter().collect();
        self
    }

    pub fn with_year_range(mut self, min: i32, max: i32) -> Self {
        self.year_range = YearRange::new(min, max);
        self
    }

    pub fn with_min_rating(mut self, min_rating: f64) -> Self {
        self.min_rating = min_rating;
        self
    }

    pub fn with_providers(
        mut self,
        provider_ids: impl IntoIterator<Item = u32>,
        strict: bool,
    ) -> Self {
        self.provider_ids = provider_ids.into_iter().collect();
        self.availability_strict = strict;
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Whether provider availability should exclude titles
    pub fn filters_by_provider(&self) -> bool {
        self.availability_strict && !self.provider_ids.is_empty()
    }

    /// Rating and release-year check applied to every fetched title.
    ///
    /// A missing or unparseable release date never fails the year check.
    pub fn accepts(&self, item: &CatalogItem) -> bool {
        if item.vote_average < self.min_rating {
            return false;
        }

        match item.release_year() {
            Some(year) => self.year_range.contains(year),
            None => true,
        }
    }

    /// Rejects ranges and ratings the catalog can't satisfy
    pub fn validate(&self) -> AppResult<()> {
        if self.year_range.min > self.year_range.max {
            return Err(AppError::InvalidInput(format!(
                "Year range start {} is after end {}",
                self.year_range.min, self.year_range.max
            )));
        }

        if !(0.0..=MAX_RATING).contains(&self.min_rating) {
            return Err(AppError::InvalidInput(format!(
                "Minimum rating must be between 0 and {}, got {}",
                MAX_RATING, self.min_rating
            )));
        }

        Ok(())
    }
}
