//! Interaction records and the identity mapping between external ids
//! and dense training indices.

use std::{collections::HashMap, fmt, ops::RangeInclusive};

use chrono::{DateTime, Utc};
use derive_more::{Display, From, Into};
use displaydoc::Display as DisplayDoc;
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::utils::nan_safe_f32_cmp;

/// The range of valid interaction ratings.
pub const RATING_RANGE: RangeInclusive<f32> = 1.0..=5.0;

/// External id of a platform user.
#[derive(
    Clone, Copy, Debug, Display, From, Into, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
pub struct UserId(i64);

/// External id of a course in the catalog.
#[derive(
    Clone, Copy, Debug, Display, From, Into, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
pub struct CourseId(i64);

/// Potential errors when assembling an interaction dataset.
#[derive(Debug, DisplayDoc, Error, PartialEq)]
pub enum DatasetError {
    /// The interaction dataset is empty
    EmptyDataset,
    /// Invalid rating {rating}, expected a value in [1.0, 5.0]
    InvalidRating { rating: f32 },
}

/// A single (user, course, rating) interaction.
///
/// Multiple interactions for the same (user, course) pair are allowed
/// and treated as independent samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub rating: f32,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Interaction {
    /// Creates a new interaction.
    ///
    /// # Errors
    ///
    /// Fails if the rating lies outside of [`RATING_RANGE`].
    pub fn new(
        user_id: impl Into<UserId>,
        course_id: impl Into<CourseId>,
        rating: f32,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Self, DatasetError> {
        if !RATING_RANGE.contains(&rating) {
            return Err(DatasetError::InvalidRating { rating });
        }
        Ok(Self {
            user_id: user_id.into(),
            course_id: course_id.into(),
            rating,
            timestamp,
        })
    }
}

/// Bijections between external ids and dense training indices.
///
/// Indices are assigned in first-seen order and form a gapless range
/// `[0, n)`. A mapping is only meaningful together with the parameters
/// of the training run which produced it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IdMappings {
    user_ids: Vec<UserId>,
    course_ids: Vec<CourseId>,
    #[serde(skip)]
    user_indices: HashMap<UserId, usize>,
    #[serde(skip)]
    course_indices: HashMap<CourseId, usize>,
}

impl IdMappings {
    /// Builds the mappings from the full interaction dataset.
    ///
    /// Deterministic for a fixed input ordering.
    ///
    /// # Errors
    ///
    /// Fails with [`DatasetError::EmptyDataset`] if no interactions are given.
    pub fn from_interactions(interactions: &[Interaction]) -> Result<Self, DatasetError> {
        if interactions.is_empty() {
            return Err(DatasetError::EmptyDataset);
        }

        let mut user_ids = Vec::new();
        let mut course_ids = Vec::new();
        let mut user_indices = HashMap::new();
        let mut course_indices = HashMap::new();

        for interaction in interactions {
            user_indices.entry(interaction.user_id).or_insert_with(|| {
                user_ids.push(interaction.user_id);
                user_ids.len() - 1
            });
            course_indices
                .entry(interaction.course_id)
                .or_insert_with(|| {
                    course_ids.push(interaction.course_id);
                    course_ids.len() - 1
                });
        }

        Ok(Self {
            user_ids,
            course_ids,
            user_indices,
            course_indices,
        })
    }

    /// Number of distinct users.
    pub fn nr_users(&self) -> usize {
        self.user_ids.len()
    }

    /// Number of distinct courses.
    pub fn nr_courses(&self) -> usize {
        self.course_ids.len()
    }

    /// The dense index of the given user, if it was seen during training.
    pub fn user_index(&self, id: UserId) -> Option<usize> {
        self.user_indices.get(&id).copied()
    }

    /// The dense index of the given course, if it was seen during training.
    pub fn course_index(&self, id: CourseId) -> Option<usize> {
        self.course_indices.get(&id).copied()
    }

    /// The external user id behind the given dense index.
    pub fn user_id(&self, index: usize) -> Option<UserId> {
        self.user_ids.get(index).copied()
    }

    /// The external course id behind the given dense index.
    pub fn course_id(&self, index: usize) -> Option<CourseId> {
        self.course_ids.get(index).copied()
    }
}

impl<'de> Deserialize<'de> for IdMappings {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        /// Helper to get a post deserialization invariant check.
        #[derive(Deserialize)]
        struct IdMappingsDeserializationHelper {
            user_ids: Vec<UserId>,
            course_ids: Vec<CourseId>,
        }

        let helper = IdMappingsDeserializationHelper::deserialize(deserializer)?;

        let user_indices = index_by_id(&helper.user_ids)
            .ok_or_else(|| <D::Error as serde::de::Error>::custom(NotABijection))?;
        let course_indices = index_by_id(&helper.course_ids)
            .ok_or_else(|| <D::Error as serde::de::Error>::custom(NotABijection))?;

        Ok(Self {
            user_ids: helper.user_ids,
            course_ids: helper.course_ids,
            user_indices,
            course_indices,
        })
    }
}

/// Inverts an index-to-id table, returning `None` on duplicate ids.
fn index_by_id<I>(ids: &[I]) -> Option<HashMap<I, usize>>
where
    I: Copy + Eq + std::hash::Hash,
{
    let map = ids
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect::<HashMap<_, _>>();
    (map.len() == ids.len()).then(|| map)
}

#[derive(Debug)]
struct NotABijection;

impl fmt::Display for NotABijection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("duplicate ids in mapping, not a bijection")
    }
}

/// Summary statistics over an interaction dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetStats {
    pub nr_interactions: usize,
    pub nr_users: usize,
    pub nr_courses: usize,
    pub min_rating: f32,
    pub max_rating: f32,
    pub mean_rating: f32,
}

impl DatasetStats {
    /// Computes the summary statistics of the given interactions.
    ///
    /// # Errors
    ///
    /// Fails with [`DatasetError::EmptyDataset`] if no interactions are given.
    pub fn of(interactions: &[Interaction]) -> Result<Self, DatasetError> {
        let mappings = IdMappings::from_interactions(interactions)?;

        let (min_rating, max_rating) = interactions
            .iter()
            .map(|interaction| interaction.rating)
            .minmax_by(nan_safe_f32_cmp)
            .into_option()
            .unwrap_or_else(|| unreachable!());
        let sum = interactions
            .iter()
            .map(|interaction| f64::from(interaction.rating))
            .sum::<f64>();

        Ok(Self {
            nr_interactions: interactions.len(),
            nr_users: mappings.nr_users(),
            nr_courses: mappings.nr_courses(),
            min_rating,
            max_rating,
            mean_rating: (sum / interactions.len() as f64) as f32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interactions(records: &[(i64, i64, f32)]) -> Vec<Interaction> {
        records
            .iter()
            .map(|&(user, course, rating)| Interaction::new(user, course, rating, None).unwrap())
            .collect()
    }

    #[test]
    fn test_mapping_assigns_first_seen_order() {
        let interactions = interactions(&[(7, 40, 5.0), (3, 40, 3.0), (7, 10, 4.0), (3, 20, 2.0)]);
        let mappings = IdMappings::from_interactions(&interactions).unwrap();

        assert_eq!(mappings.nr_users(), 2);
        assert_eq!(mappings.nr_courses(), 3);
        assert_eq!(mappings.user_index(UserId(7)), Some(0));
        assert_eq!(mappings.user_index(UserId(3)), Some(1));
        assert_eq!(mappings.course_index(CourseId(40)), Some(0));
        assert_eq!(mappings.course_index(CourseId(10)), Some(1));
        assert_eq!(mappings.course_index(CourseId(20)), Some(2));
    }

    #[test]
    fn test_mapping_round_trips_all_ids() {
        let interactions = interactions(&[(1, 1, 5.0), (1, 2, 3.0), (2, 1, 4.0), (2, 3, 4.5)]);
        let mappings = IdMappings::from_interactions(&interactions).unwrap();

        for index in 0..mappings.nr_users() {
            let id = mappings.user_id(index).unwrap();
            assert_eq!(mappings.user_index(id), Some(index));
        }
        for index in 0..mappings.nr_courses() {
            let id = mappings.course_id(index).unwrap();
            assert_eq!(mappings.course_index(id), Some(index));
        }
    }

    #[test]
    fn test_mapping_is_deterministic_for_fixed_order() {
        let interactions = interactions(&[(5, 2, 4.0), (1, 9, 2.0), (5, 9, 3.5)]);
        let first = IdMappings::from_interactions(&interactions).unwrap();
        let second = IdMappings::from_interactions(&interactions).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_dataset_is_rejected() {
        assert_eq!(
            IdMappings::from_interactions(&[]).unwrap_err(),
            DatasetError::EmptyDataset,
        );
    }

    #[test]
    fn test_out_of_range_rating_is_rejected() {
        assert_eq!(
            Interaction::new(1, 1, 0.5, None).unwrap_err(),
            DatasetError::InvalidRating { rating: 0.5 },
        );
        assert_eq!(
            Interaction::new(1, 1, 5.5, None).unwrap_err(),
            DatasetError::InvalidRating { rating: 5.5 },
        );
        assert!(Interaction::new(1, 1, 1.0, None).is_ok());
        assert!(Interaction::new(1, 1, 5.0, None).is_ok());
    }

    #[test]
    fn test_unknown_ids_are_unmapped() {
        let interactions = interactions(&[(1, 1, 5.0)]);
        let mappings = IdMappings::from_interactions(&interactions).unwrap();
        assert_eq!(mappings.user_index(UserId(99)), None);
        assert_eq!(mappings.course_index(CourseId(99)), None);
        assert_eq!(mappings.user_id(1), None);
    }

    #[test]
    fn test_dataset_stats() {
        let interactions = interactions(&[(1, 1, 5.0), (1, 2, 3.0), (2, 1, 4.0)]);
        let stats = DatasetStats::of(&interactions).unwrap();
        assert_eq!(stats.nr_interactions, 3);
        assert_eq!(stats.nr_users, 2);
        assert_eq!(stats.nr_courses, 2);
        assert!((stats.min_rating - 3.0).abs() < f32::EPSILON);
        assert!((stats.max_rating - 5.0).abs() < f32::EPSILON);
        assert!((stats.mean_rating - 4.0).abs() < 1e-6);
    }
}
