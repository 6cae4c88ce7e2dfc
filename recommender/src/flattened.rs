//! (De)serialization helper for ndarray arrays.
//!
//! The serialization format of `ArrayBase` is not fixed, so arrays are
//! stored as explicit shape plus row-major data instead.

use std::convert::TryFrom;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// A flattened array in row-major order.
///
/// Invariant: the length of `data` is equal to the product of all
/// values in `shape`, which is checked when deserializing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct FlattenedArray {
    shape: Vec<usize>,
    data: Vec<f32>,
}

#[derive(Debug, Error)]
#[error("Unexpected array shape: got={got:?}, expected {expected}")]
pub(crate) struct UnexpectedArrayShape {
    got: Vec<usize>,
    expected: &'static str,
}

impl From<Array1<f32>> for FlattenedArray {
    fn from(array: Array1<f32>) -> Self {
        let shape = array.shape().to_owned();
        let data = array.into_raw_vec();
        Self { shape, data }
    }
}

impl From<Array2<f32>> for FlattenedArray {
    fn from(array: Array2<f32>) -> Self {
        let shape = array.shape().to_owned();
        let data = if array.is_standard_layout() {
            array.into_raw_vec()
        } else {
            array.iter().copied().collect()
        };
        Self { shape, data }
    }
}

impl TryFrom<FlattenedArray> for Array1<f32> {
    type Error = UnexpectedArrayShape;

    fn try_from(array: FlattenedArray) -> Result<Self, Self::Error> {
        match *array.shape.as_slice() {
            [_] => Ok(Array1::from(array.data)),
            _ => Err(UnexpectedArrayShape {
                got: array.shape,
                expected: "one dimension",
            }),
        }
    }
}

impl TryFrom<FlattenedArray> for Array2<f32> {
    type Error = UnexpectedArrayShape;

    fn try_from(array: FlattenedArray) -> Result<Self, Self::Error> {
        match *array.shape.as_slice() {
            [rows, cols] => {
                // The length invariant was checked during deserialization.
                Array2::from_shape_vec((rows, cols), array.data).map_err(|_| {
                    UnexpectedArrayShape {
                        got: vec![rows, cols],
                        expected: "shape matching the data length",
                    }
                })
            }
            _ => Err(UnexpectedArrayShape {
                got: array.shape,
                expected: "two dimensions",
            }),
        }
    }
}

impl<'de> Deserialize<'de> for FlattenedArray {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        /// Helper to get a post deserialization invariant check.
        #[derive(Deserialize)]
        struct FlattenedArrayDeserializationHelper {
            shape: Vec<usize>,
            data: Vec<f32>,
        }

        let helper = FlattenedArrayDeserializationHelper::deserialize(deserializer)?;

        let expected_data_len = helper.shape.iter().product::<usize>();
        if helper.data.len() != expected_data_len {
            Err(<D::Error as serde::de::Error>::custom(format!(
                "expected {} array elements, got {}",
                expected_data_len,
                helper.data.len(),
            )))
        } else {
            Ok(Self {
                shape: helper.shape,
                data: helper.data,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::TryInto;

    use ndarray::{arr1, arr2};

    use super::*;

    #[test]
    fn test_array1_round_trip() {
        let array = arr1(&[3.0f32, 2., 1., 4.]);
        let flattened = FlattenedArray::from(array.clone());
        let restored: Array1<f32> = flattened.try_into().unwrap();
        assert_eq!(restored, array);
    }

    #[test]
    fn test_array2_round_trip() {
        let array = arr2(&[[1.0f32, 2.], [3., 4.], [5., 6.]]);
        let flattened = FlattenedArray::from(array.clone());
        let restored: Array2<f32> = flattened.try_into().unwrap();
        assert_eq!(restored, array);
    }

    #[test]
    fn test_dimensionality_mismatch_is_rejected() {
        let flattened = FlattenedArray::from(arr1(&[1.0f32, 2.]));
        let restored: Result<Array2<f32>, _> = flattened.try_into();
        assert!(restored.is_err());
    }

    #[test]
    fn test_length_invariant_is_checked_on_deserialization() {
        let bad = bincode::serialize(&FlattenedArray {
            shape: vec![2, 2],
            data: vec![1.0, 2.0, 3.0],
        })
        .unwrap();
        assert!(bincode::deserialize::<FlattenedArray>(&bad).is_err());
    }
}
