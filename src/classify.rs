//! Classification of per-key deviations against their median deviation.
//!
//! The same rule is used for antennas, time samples and baselines, by every flagger.

use std::collections::BTreeMap;

use strum_macros::Display;
use thiserror::Error;

use crate::{
    constants::{BAD_DEVIATION_RATIO, BORDERLINE_DEVIATION_RATIO},
    stats::median,
};

/// Severity of a key's deviation. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum DeviationClass {
    /// Ratio of at most [`BORDERLINE_DEVIATION_RATIO`]
    Normal,
    /// Ratio above [`BORDERLINE_DEVIATION_RATIO`], up to [`BAD_DEVIATION_RATIO`]
    Borderline,
    /// Ratio above [`BAD_DEVIATION_RATIO`]
    Bad,
}

impl DeviationClass {
    /// Classify a deviation ratio.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > BAD_DEVIATION_RATIO {
            Self::Bad
        } else if ratio > BORDERLINE_DEVIATION_RATIO {
            Self::Borderline
        } else {
            Self::Normal
        }
    }
}

/// The reference deviation is zero, so no ratio can be formed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("reference deviation is zero")]
pub struct SingularReference;

/// `deviation / reference`
///
/// # Errors
///
/// Will return [`SingularReference`] if `reference` is zero.
pub fn deviation_ratio(deviation: f64, reference: f64) -> Result<f64, SingularReference> {
    if reference == 0. {
        Err(SingularReference)
    } else {
        Ok(deviation / reference)
    }
}

/// The class of each key of a deviation map.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification<K: Ord> {
    /// The median of the deviations. `None` if the map was empty.
    pub reference: Option<f64>,
    /// The class of each key
    pub classes: BTreeMap<K, DeviationClass>,
}

impl<K: Ord + Copy> Classification<K> {
    /// Keys of the given class, in ascending order
    pub fn keys_of(&self, class: DeviationClass) -> Vec<K> {
        self.classes
            .iter()
            .filter(|&(_, &other)| other == class)
            .map(|(&key, _)| key)
            .collect()
    }

    /// Keys classified [`DeviationClass::Bad`]
    pub fn bad(&self) -> Vec<K> {
        self.keys_of(DeviationClass::Bad)
    }

    /// Keys classified [`DeviationClass::Borderline`]
    pub fn borderline(&self) -> Vec<K> {
        self.keys_of(DeviationClass::Borderline)
    }

    /// The class of `key`, if it was in the deviation map
    pub fn get(&self, key: &K) -> Option<DeviationClass> {
        self.classes.get(key).copied()
    }
}

/// Classify every key of a deviation map by the ratio of its deviation to the median
/// deviation. If the map is empty or the median deviation is zero, every key is
/// [`DeviationClass::Normal`].
///
/// # Examples
///
/// ```rust
/// use std::collections::BTreeMap;
/// use artip::classify::{classify, DeviationClass};
///
/// let deviations = BTreeMap::from([(1, 1.0), (2, 1.0), (3, 1.0), (4, 20.0)]);
/// let classification = classify(&deviations);
/// assert_eq!(classification.bad(), vec![4]);
/// assert_eq!(classification.get(&1), Some(DeviationClass::Normal));
/// ```
pub fn classify<K: Ord + Copy>(deviations: &BTreeMap<K, f64>) -> Classification<K> {
    let values: Vec<f64> = deviations.values().copied().collect();
    let reference = median(&values);
    let classes = deviations
        .iter()
        .map(|(&key, &deviation)| {
            let class = match reference.map(|reference| deviation_ratio(deviation, reference)) {
                Some(Ok(ratio)) => DeviationClass::from_ratio(ratio),
                Some(Err(SingularReference)) | None => DeviationClass::Normal,
            };
            (key, class)
        })
        .collect();
    Classification { reference, classes }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_outlier_is_bad() {
        let deviations = BTreeMap::from([(1, 1.), (2, 1.), (3, 1.), (4, 20.)]);
        let classification = classify(&deviations);
        assert_eq!(classification.reference, Some(1.));
        assert_eq!(classification.bad(), vec![4]);
        assert!(classification.borderline().is_empty());
        assert_eq!(classification.keys_of(DeviationClass::Normal), vec![1, 2, 3]);
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        // median is 1.0
        let deviations = BTreeMap::from([
            ('a', 1.),
            ('b', 1.),
            ('c', 1.),
            ('d', 1.),
            ('e', 1.),
            ('f', 3.),
            ('g', 3.5),
            ('h', 5.),
            ('i', 5.01),
        ]);
        let classification = classify(&deviations);
        assert_eq!(classification.get(&'f'), Some(DeviationClass::Normal));
        assert_eq!(classification.get(&'g'), Some(DeviationClass::Borderline));
        assert_eq!(classification.get(&'h'), Some(DeviationClass::Borderline));
        assert_eq!(classification.get(&'i'), Some(DeviationClass::Bad));
        assert_eq!(classification.get(&'z'), None);
    }

    #[test]
    fn test_zero_reference_is_all_normal() {
        let deviations = BTreeMap::from([(1, 0.), (2, 0.), (3, 7.)]);
        let classification = classify(&deviations);
        assert_eq!(classification.reference, Some(0.));
        assert!(classification
            .classes
            .values()
            .all(|&class| class == DeviationClass::Normal));
        assert_eq!(deviation_ratio(7., 0.), Err(SingularReference));
    }

    #[test]
    fn test_empty_map() {
        let classification = classify::<usize>(&BTreeMap::new());
        assert_eq!(classification.reference, None);
        assert!(classification.classes.is_empty());
    }

    #[test]
    fn test_severity_dominates() {
        let deviations: BTreeMap<usize, f64> =
            (0..20).map(|key| (key, 0.5 * (key * key) as f64)).collect();
        let classification = classify(&deviations);
        let reference = classification.reference.unwrap();
        for (key_a, &dev_a) in &deviations {
            for (key_b, &dev_b) in &deviations {
                let ratio_a = dev_a / reference;
                let ratio_b = dev_b / reference;
                let class_a = classification.get(key_a).unwrap();
                let class_b = classification.get(key_b).unwrap();
                if ratio_a > 5. && ratio_b <= 5. {
                    assert!(class_a > class_b);
                }
                if ratio_a > 3. && ratio_b <= 3. {
                    assert!(class_a > class_b);
                }
            }
        }
        assert!(DeviationClass::Bad > DeviationClass::Borderline);
        assert!(DeviationClass::Borderline > DeviationClass::Normal);
    }
}
