//! Biased matrix-factorization model parameters and rating prediction.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Standard deviation of the random factor initialization.
///
/// Small enough to start close to the bias-only model, non-zero to
/// break the symmetry between factors.
const INIT_STD_DEV: f32 = 0.1;

/// The learned parameters of a biased matrix-factorization model.
///
/// A rating is reconstructed as
/// `global_bias + user_biases[u] + course_biases[i]
///  + user_factors.row(u) · course_factors.row(i)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelParameters {
    pub(crate) global_bias: f32,
    pub(crate) user_biases: Array1<f32>,
    pub(crate) course_biases: Array1<f32>,
    pub(crate) user_factors: Array2<f32>,
    pub(crate) course_factors: Array2<f32>,
}

impl ModelParameters {
    /// Creates parameters with zero biases and random factors.
    ///
    /// The factor entries are drawn independently from a zero-mean
    /// normal distribution.
    pub(crate) fn new_with_random_factors(
        nr_users: usize,
        nr_courses: usize,
        nr_factors: usize,
        global_bias: f32,
        rng: &mut impl Rng,
    ) -> Self {
        // std dev is a small positive constant, this cannot fail
        let normal = Normal::new(0., INIT_STD_DEV).unwrap();
        let user_factors =
            Array2::from_shape_fn((nr_users, nr_factors), |_| normal.sample(rng));
        let course_factors =
            Array2::from_shape_fn((nr_courses, nr_factors), |_| normal.sample(rng));

        Self {
            global_bias,
            user_biases: Array1::zeros(nr_users),
            course_biases: Array1::zeros(nr_courses),
            user_factors,
            course_factors,
        }
    }

    /// Predicts the rating of user `u` for course `i`.
    ///
    /// Pure and deterministic for fixed parameters. The result is not
    /// clamped to the rating range.
    ///
    /// # Panics
    ///
    /// Panics if `u` or `i` is out of bounds.
    pub fn predict(&self, u: usize, i: usize) -> f32 {
        self.global_bias
            + self.user_biases[u]
            + self.course_biases[i]
            + self.user_factors.row(u).dot(&self.course_factors.row(i))
    }

    /// The mean rating over the training split.
    pub fn global_bias(&self) -> f32 {
        self.global_bias
    }

    /// Number of users covered by these parameters.
    pub fn nr_users(&self) -> usize {
        self.user_factors.nrows()
    }

    /// Number of courses covered by these parameters.
    pub fn nr_courses(&self) -> usize {
        self.course_factors.nrows()
    }

    /// Number of latent factors per user/course.
    pub fn nr_factors(&self) -> usize {
        self.user_factors.ncols()
    }

    /// True if all bias and factor shapes agree with the given sizes.
    pub(crate) fn has_shapes(&self, nr_users: usize, nr_courses: usize) -> bool {
        self.user_biases.len() == nr_users
            && self.course_biases.len() == nr_courses
            && self.user_factors.nrows() == nr_users
            && self.course_factors.nrows() == nr_courses
            && self.user_factors.ncols() == self.course_factors.ncols()
    }
}
