// Compatibility resolution between a partial selection and the catalog

use crate::catalog::{Catalog, RateId, RateOption, Recommendation};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
pub struct CompatibilityResolver<'a> {
    catalog: &'a Catalog,
}

impl<'a> CompatibilityResolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    // Recommendations whose leading rates equal `prefix`
    pub fn matching_recommendations<'p>(
        &self,
        prefix: &'p [RateId],
    ) -> impl Iterator<Item = &'a Recommendation> + 'p
    where
        'a: 'p,
    {
        self.catalog
            .recommendations()
            .iter()
            .filter(move |recommendation| recommendation.rates.starts_with(prefix))
    }

    // Rates selectable for room `prefix.len()`, in candidate-list order.
    // Empty once the prefix covers every room.
    pub fn resolve(&self, prefix: &[RateId]) -> Vec<RateOption> {
        let room = prefix.len();
        if room >= self.catalog.room_count() {
            return Vec::new();
        }

        let allowed: HashSet<&RateId> = self
            .matching_recommendations(prefix)
            .filter_map(|recommendation| recommendation.rate_for(room))
            .collect();

        self.catalog
            .rates_for(room)
            .iter()
            .filter(|option| allowed.contains(&option.rate_id))
            .cloned()
            .collect()
    }

    // Room where the selection has to restart from, or None if still consistent
    pub fn first_divergent_room(&self, chosen: &[RateId]) -> Option<usize> {
        (1..=chosen.len())
            .find(|&len| {
                chosen
                    .get(..len)
                    .map_or(true, |prefix| self.matching_recommendations(prefix).next().is_none())
            })
            .map(|len| len - 1)
    }
}
