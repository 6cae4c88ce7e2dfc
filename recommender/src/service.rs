//! Ranking of catalog courses for a user, with popularity fallback.
//!
//! The serving path is a pure read over the model cache and the
//! catalog/enrollment snapshots supplied by the collaborators. Model
//! unavailability and cold-start users are defined branches of the
//! ranking, not failures: callers always get a ranked, possibly
//! degraded, list.

use std::{collections::HashSet, error::Error as StdError};

use displaydoc::Display;
use log::debug;
use thiserror::Error;

use crate::{
    cache::ModelCache,
    dataset::{CourseId, UserId},
    utils::nan_safe_f32_cmp_desc,
};

/// Catalog snapshot of a single course.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CourseSummary {
    pub id: CourseId,
    pub is_active: bool,
    pub is_published: bool,
    pub enrollment_count: u64,
}

impl CourseSummary {
    /// True if the course may be recommended at all.
    fn is_eligible(&self) -> bool {
        self.is_active && self.is_published
    }
}

/// Supplies the course catalog snapshot.
pub trait CatalogSource {
    type Error: StdError + 'static;

    /// Returns a snapshot of all courses.
    fn courses(&self) -> Result<Vec<CourseSummary>, Self::Error>;
}

/// Supplies the set of courses a user is already enrolled in.
pub trait EnrollmentSource {
    type Error: StdError + 'static;

    /// Returns the ids of all courses the given user is enrolled in.
    fn enrolled_course_ids(&self, user_id: UserId) -> Result<HashSet<CourseId>, Self::Error>;
}

/// An error which can occur while serving a recommendation.
///
/// This is either a contract violation by the caller or an error from
/// one of the collaborators. Model unavailability and cold-start are
/// handled internally and never surface here.
#[derive(Debug, Display, Error)]
pub enum RecommendError<CE, EE>
where
    CE: StdError + 'static,
    EE: StdError + 'static,
{
    /// The recommendation limit must be positive
    InvalidLimit,
    /// Retrieving the course catalog failed: {0}
    Catalog(#[source] CE),
    /// Retrieving the user enrollments failed: {0}
    Enrollment(#[source] EE),
}

/// The recommendation service.
pub struct RecommendationService<'a, C, E>
where
    C: CatalogSource,
    E: EnrollmentSource,
{
    cache: &'a ModelCache,
    catalog: C,
    enrollments: E,
}

impl<'a, C, E> RecommendationService<'a, C, E>
where
    C: CatalogSource,
    E: EnrollmentSource,
{
    /// Creates a new service reading models from the given cache.
    pub fn new(cache: &'a ModelCache, catalog: C, enrollments: E) -> Self {
        Self {
            cache,
            catalog,
            enrollments,
        }
    }

    /// Recommends up to `limit` courses for the given user.
    ///
    /// Personalized recommendations exclude courses the user is
    /// already enrolled in. If no model is available or the user was
    /// not seen during training, the most popular eligible courses are
    /// returned instead (enrollments are not excluded on that path).
    ///
    /// Ties are broken deterministically by ascending course id, both
    /// on the personalized path (equal predicted rating) and on the
    /// popularity path (equal enrollment count).
    ///
    /// # Errors
    ///
    /// - [`RecommendError::InvalidLimit`] if `limit` is zero.
    /// - Collaborator errors are propagated as
    ///   [`RecommendError::Catalog`]/[`RecommendError::Enrollment`].
    pub fn recommend(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<CourseId>, RecommendError<C::Error, E::Error>> {
        if limit == 0 {
            return Err(RecommendError::InvalidLimit);
        }

        let courses = self.catalog.courses().map_err(RecommendError::Catalog)?;

        let artifact = match self.cache.get() {
            Some(artifact) => artifact,
            None => {
                debug!("no model available, falling back to popular courses");
                return Ok(popular_courses(courses, limit));
            }
        };
        let user_index = match artifact.mappings.user_index(user_id) {
            Some(user_index) => user_index,
            None => {
                debug!(
                    "user {} not seen during training, falling back to popular courses",
                    user_id,
                );
                return Ok(popular_courses(courses, limit));
            }
        };

        let enrolled = self
            .enrollments
            .enrolled_course_ids(user_id)
            .map_err(RecommendError::Enrollment)?;

        let mut scored = courses
            .into_iter()
            .filter(|course| course.is_eligible() && !enrolled.contains(&course.id))
            .filter_map(|course| {
                artifact
                    .mappings
                    .course_index(course.id)
                    .map(|course_index| {
                        (course.id, artifact.params.predict(user_index, course_index))
                    })
            })
            .collect::<Vec<_>>();

        scored.sort_unstable_by(|(a_id, a_rating), (b_id, b_rating)| {
            nan_safe_f32_cmp_desc(a_rating, b_rating).then_with(|| a_id.cmp(b_id))
        });
        scored.truncate(limit);

        Ok(scored.into_iter().map(|(id, _)| id).collect())
    }
}

/// Ranks eligible courses by enrollment count.
fn popular_courses(mut courses: Vec<CourseSummary>, limit: usize) -> Vec<CourseId> {
    courses.retain(CourseSummary::is_eligible);
    courses.sort_unstable_by(|a, b| {
        b.enrollment_count
            .cmp(&a.enrollment_count)
            .then_with(|| a.id.cmp(&b.id))
    });
    courses.truncate(limit);
    courses.into_iter().map(|course| course.id).collect()
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use tempfile::tempdir;

    use super::*;
    use crate::{
        artifact::ModelArtifact,
        config::TrainConfig,
        dataset::Interaction,
        trainer::Trainer,
    };

    struct InMemoryCatalog(Vec<CourseSummary>);

    impl CatalogSource for InMemoryCatalog {
        type Error = Infallible;

        fn courses(&self) -> Result<Vec<CourseSummary>, Self::Error> {
            Ok(self.0.clone())
        }
    }

    struct InMemoryEnrollments(HashSet<CourseId>);

    impl EnrollmentSource for InMemoryEnrollments {
        type Error = Infallible;

        fn enrolled_course_ids(&self, _: UserId) -> Result<HashSet<CourseId>, Self::Error> {
            Ok(self.0.clone())
        }
    }

    fn course(id: i64, enrollment_count: u64) -> CourseSummary {
        CourseSummary {
            id: id.into(),
            is_active: true,
            is_published: true,
            enrollment_count,
        }
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog(vec![
            course(1, 50),
            course(2, 10),
            course(3, 80),
            CourseSummary {
                is_active: false,
                ..course(4, 500)
            },
            CourseSummary {
                is_published: false,
                ..course(5, 400)
            },
        ])
    }

    fn no_enrollments() -> InMemoryEnrollments {
        InMemoryEnrollments(HashSet::new())
    }

    fn enrollments(ids: &[i64]) -> InMemoryEnrollments {
        InMemoryEnrollments(ids.iter().map(|&id| id.into()).collect())
    }

    /// Trains on the small end-to-end dataset and saves the artifact
    /// into a fresh cache.
    fn populated_cache(dir: &std::path::Path) -> ModelCache {
        let interactions = [
            (1i64, 1i64, 5.0),
            (1, 2, 3.0),
            (2, 1, 4.0),
            (2, 2, 5.0),
            (2, 3, 4.5),
        ]
        .iter()
        .map(|&(user, course, rating)| Interaction::new(user, course, rating, None).unwrap())
        .collect::<Vec<_>>();
        let config = TrainConfig::default()
            .with_factors(2)
            .and_then(|config| config.with_epochs(20))
            .and_then(|config| config.with_learning_rate(0.01))
            .and_then(|config| config.with_regularization(0.02))
            .unwrap();
        let outcome = Trainer::new(config.clone()).train(&interactions).unwrap();
        assert_eq!(outcome.mappings.nr_users(), 2);
        assert_eq!(outcome.mappings.nr_courses(), 3);

        let path = dir.join("model.bin");
        ModelArtifact::from_outcome(outcome, &config)
            .save(&path)
            .unwrap();
        ModelCache::new(path)
    }

    fn empty_cache(dir: &std::path::Path) -> ModelCache {
        ModelCache::new(dir.join("missing.bin"))
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let dir = tempdir().unwrap();
        let cache = empty_cache(dir.path());
        let service = RecommendationService::new(&cache, catalog(), no_enrollments());
        assert!(matches!(
            service.recommend(1.into(), 0),
            Err(RecommendError::InvalidLimit),
        ));
    }

    #[test]
    fn test_unavailable_model_falls_back_to_popularity() {
        let dir = tempdir().unwrap();
        let cache = empty_cache(dir.path());
        let service = RecommendationService::new(&cache, catalog(), no_enrollments());

        let recommended = service.recommend(1.into(), 5).unwrap();
        // eligible courses by enrollment count: 3 (80), 1 (50), 2 (10)
        let expected: Vec<CourseId> = vec![3.into(), 1.into(), 2.into()];
        assert_eq!(recommended, expected);
    }

    #[test]
    fn test_cold_start_user_falls_back_to_popularity() {
        let dir = tempdir().unwrap();
        let cache = populated_cache(dir.path());
        let service = RecommendationService::new(&cache, catalog(), enrollments(&[1, 2, 3]));

        // user 99 was not part of the training data; enrollments are
        // not excluded on the fallback path
        let recommended = service.recommend(99.into(), 2).unwrap();
        let expected: Vec<CourseId> = vec![3.into(), 1.into()];
        assert_eq!(recommended, expected);
    }

    #[test]
    fn test_popularity_ties_break_by_ascending_id() {
        let dir = tempdir().unwrap();
        let cache = empty_cache(dir.path());
        let catalog = InMemoryCatalog(vec![course(9, 10), course(2, 10), course(5, 10)]);
        let service = RecommendationService::new(&cache, catalog, no_enrollments());

        let recommended = service.recommend(1.into(), 3).unwrap();
        let expected: Vec<CourseId> = vec![2.into(), 5.into(), 9.into()];
        assert_eq!(recommended, expected);
    }

    #[test]
    fn test_personalized_excludes_enrolled_courses() {
        let dir = tempdir().unwrap();
        let cache = populated_cache(dir.path());
        let service = RecommendationService::new(&cache, catalog(), enrollments(&[1]));

        let recommended = service.recommend(1.into(), 5).unwrap();
        assert!(!recommended.contains(&1.into()));
        assert!(!recommended.is_empty());
        for id in &recommended {
            assert!([CourseId::from(2), 3.into()].contains(id));
        }
    }

    #[test]
    fn test_personalized_respects_limit_and_mapping() {
        let dir = tempdir().unwrap();
        let cache = populated_cache(dir.path());
        // course 6 is eligible but was never seen during training
        let mut courses = catalog().0;
        courses.push(course(6, 1000));
        let service =
            RecommendationService::new(&cache, InMemoryCatalog(courses), no_enrollments());

        let recommended = service.recommend(1.into(), 2).unwrap();
        assert_eq!(recommended.len(), 2);
        for id in &recommended {
            assert!([CourseId::from(1), 2.into(), 3.into()].contains(id));
        }
    }

    #[test]
    fn test_personalized_ranks_by_predicted_rating() {
        let dir = tempdir().unwrap();
        let cache = populated_cache(dir.path());
        let service = RecommendationService::new(&cache, catalog(), no_enrollments());

        let recommended = service.recommend(1.into(), 3).unwrap();
        let artifact = cache.get().unwrap();
        let user_index = artifact.mappings.user_index(1.into()).unwrap();
        let ratings = recommended
            .iter()
            .map(|&id| {
                let course_index = artifact.mappings.course_index(id).unwrap();
                artifact.params.predict(user_index, course_index)
            })
            .collect::<Vec<_>>();
        assert!(ratings.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn test_recommendation_has_no_side_effects_on_the_cache() {
        let dir = tempdir().unwrap();
        let cache = populated_cache(dir.path());
        let service = RecommendationService::new(&cache, catalog(), no_enrollments());

        service.recommend(1.into(), 3).unwrap();
        service.recommend(2.into(), 3).unwrap();
        service.recommend(99.into(), 3).unwrap();
        assert_eq!(cache.load_attempts(), 1);
    }
}
