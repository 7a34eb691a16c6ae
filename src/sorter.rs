use crate::{enums::SortBy, slice::SliceRecord};

use log::{debug, warn};

/// How a series ended up ordered.
#[derive(Clone, Debug, PartialEq)]
pub enum SortOutcome {
    /// Sorted ascending by the requested key.
    Sorted(SortBy),
    /// Left in discovery order because `SortBy::None` was requested.
    Unsorted,
    /// Some slice had no usable key; discovery order was kept.
    DiscoveryOrderFallback { key: SortBy, missing: usize },
}

fn sort_key(slice: &SliceRecord, sort_by: SortBy) -> Option<f64> {
    match sort_by {
        SortBy::ImagePositionPatient => slice.through_axis(),
        SortBy::SliceLocation => slice.slice_location(),
        SortBy::InstanceNumber => slice.instance_number().map(f64::from),
        SortBy::None => None,
    }
    .filter(|key| key.is_finite())
}

/// Order slices ascending by `sort_by`.
///
/// The sort is stable, so slices sharing a key keep discovery order. If any
/// slice lacks the key the whole series keeps discovery order instead and
/// the fallback is reported.
pub fn sort_slices(slices: &mut Vec<SliceRecord>, sort_by: SortBy) -> SortOutcome {
    if matches!(sort_by, SortBy::None) {
        return SortOutcome::Unsorted;
    }

    let keys: Vec<Option<f64>> = slices.iter().map(|s| sort_key(s, sort_by)).collect();
    let missing = keys.iter().filter(|k| k.is_none()).count();
    if missing > 0 {
        warn!(
            "{missing} of {} slices have no usable {sort_by:?}, keeping discovery order",
            slices.len()
        );
        return SortOutcome::DiscoveryOrderFallback {
            key: sort_by,
            missing,
        };
    }

    let mut keyed: Vec<(f64, SliceRecord)> = keys
        .into_iter()
        .flatten()
        .zip(slices.drain(..))
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    slices.extend(keyed.into_iter().map(|(_, slice)| slice));

    debug!("sorted {} slices by {sort_by:?}", slices.len());
    SortOutcome::Sorted(sort_by)
}
