use crate::core::merge::MergeStats;
use crate::domain::model::{MergedField, MergedRecord};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Values tied for the highest frequency inside one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopValues {
    pub count: usize,
    pub values: BTreeSet<String>,
}

/// For every group, the values of `value_key` that occur most often. Ties are all kept.
pub fn group_mode<'a, T, I, G, V, K, W>(
    items: I,
    group_key: G,
    value_key: V,
) -> BTreeMap<String, TopValues>
where
    T: 'a,
    I: IntoIterator<Item = &'a T>,
    G: Fn(&'a T) -> K,
    V: Fn(&'a T) -> W,
    K: Into<String>,
    W: Into<String>,
{
    let mut counts: HashMap<String, HashMap<String, usize>> = HashMap::new();
    for item in items {
        *counts
            .entry(group_key(item).into())
            .or_default()
            .entry(value_key(item).into())
            .or_default() += 1;
    }

    counts
        .into_iter()
        .filter_map(|(group, frequencies)| {
            let count = frequencies.values().copied().max()?;
            let values = frequencies
                .into_iter()
                .filter(|(_, n)| *n == count)
                .map(|(value, _)| value)
                .collect();
            Some((group, TopValues { count, values }))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregationReport {
    pub group_by: MergedField,
    pub count_field: MergedField,
    pub records: usize,
    pub groups: BTreeMap<String, TopValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeStats>,
}

pub fn aggregate(
    records: &[MergedRecord],
    group_by: MergedField,
    count_field: MergedField,
) -> AggregationReport {
    let groups = group_mode(
        records,
        |r| r.field(group_by),
        |r| r.field(count_field),
    );
    AggregationReport {
        group_by,
        count_field,
        records: records.len(),
        groups,
        merge: None,
    }
}

/// Most popular vehicle make for each gender.
pub fn most_popular_make_by_gender(records: &[MergedRecord]) -> BTreeMap<String, TopValues> {
    aggregate(records, MergedField::Gender, MergedField::VehicleMake).groups
}
