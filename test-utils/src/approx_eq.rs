/// Compares two "things" with approximate equality.
///
/// This can be used to compare two floating point numbers:
///
/// ```
/// use test_utils::assert_approx_eq;
/// assert_approx_eq!(f32, 0.15039155, 0.1503916, ulps = 3);
/// ```
///
/// Or iterables of such, including ndarray arrays:
///
/// ```
/// use ndarray::arr1;
/// use test_utils::assert_approx_eq;
/// assert_approx_eq!(f32, arr1(&[1.0, 2.]), arr1(&[1.0, 2.]));
/// ```
///
/// The number of `ulps` defaults to `2` if not specified. Two NaN
/// values are treated as approximately equal, since the assertion
/// checks for "an expected outcome" rather than semantic equality.
#[macro_export]
macro_rules! assert_approx_eq {
    ($t:ty, $left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($t, $left, $right, epsilon = 0., ulps = 2)
    };
    ($t:ty, $left:expr, $right:expr, ulps = $ulps:expr $(,)?) => {
        $crate::assert_approx_eq!($t, $left, $right, epsilon = 0., ulps = $ulps)
    };
    ($t:ty, $left:expr, $right:expr, epsilon = $epsilon:expr $(,)?) => {
        $crate::assert_approx_eq!($t, $left, $right, epsilon = $epsilon, ulps = 2)
    };
    ($t:ty, $left:expr, $right:expr, epsilon = $epsilon:expr, ulps = $ulps:expr $(,)?) => {{
        let epsilon = $epsilon;
        let ulps = $ulps;
        let left = $crate::ApproxIter::approx_values(&$left);
        let right = $crate::ApproxIter::approx_values(&$right);
        std::assert_eq!(
            left.len(),
            right.len(),
            "length mismatch: {} != {}",
            left.len(),
            right.len(),
        );
        for (index, (lv, rv)) in left.into_iter().zip(right).enumerate() {
            if !(lv.is_nan() && rv.is_nan()) {
                std::assert!(
                    $crate::approx_eq!(f32, lv, rv, ulps = ulps, epsilon = epsilon),
                    "approximated equal assertion failed (ulps={:?}, epsilon={:?}) at index {}: {:?} == {:?}",
                    ulps,
                    epsilon,
                    index,
                    lv,
                    rv,
                );
            }
        }
    }};
}

/// Helper trait for the [`assert_approx_eq!`] macro.
///
/// Flattens scalars, slices and ndarray arrays into their leaf values
/// in logical order. Only use it for [`assert_approx_eq!`].
pub trait ApproxIter {
    fn approx_values(&self) -> Vec<f32>;
}

impl ApproxIter for f32 {
    fn approx_values(&self) -> Vec<f32> {
        vec![*self]
    }
}

impl ApproxIter for [f32] {
    fn approx_values(&self) -> Vec<f32> {
        self.to_vec()
    }
}

impl ApproxIter for Vec<f32> {
    fn approx_values(&self) -> Vec<f32> {
        self.clone()
    }
}

impl<const N: usize> ApproxIter for [f32; N] {
    fn approx_values(&self) -> Vec<f32> {
        self.to_vec()
    }
}

impl<S, D> ApproxIter for ndarray::ArrayBase<S, D>
where
    S: ndarray::Data<Elem = f32>,
    D: ndarray::Dimension,
{
    fn approx_values(&self) -> Vec<f32> {
        self.iter().copied().collect()
    }
}

impl<A> ApproxIter for &A
where
    A: ApproxIter + ?Sized,
{
    fn approx_values(&self) -> Vec<f32> {
        (**self).approx_values()
    }
}
