// Final cross-room validation of a complete selection

use crate::catalog::{Catalog, RateId, Recommendation, RecommendationId};
use crate::resolver::CompatibilityResolver;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Selection matches no recommendation; first divergent room is {first_divergent_room:?}")]
    Incompatible {
        chosen: Vec<RateId>,
        first_divergent_room: Option<usize>,
    },

    #[error("Selection has {chosen} rates but the catalog has {rooms} rooms")]
    IllegalTransition { chosen: usize, rooms: usize },

    #[error("Selection matches {count} recommendations and the policy forbids choosing")]
    Ambiguous { count: usize },
}

// How to pick among several recommendations sharing one rate vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakPolicy {
    // Lowest total price, then earliest in the catalog
    #[default]
    CheapestThenListed,
    FirstListed,
    RejectAmbiguous,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    policy: TieBreakPolicy,
}

impl Validator {
    pub fn new(policy: TieBreakPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TieBreakPolicy {
        self.policy
    }

    pub fn validate(
        &self,
        catalog: &Catalog,
        chosen: &[RateId],
    ) -> Result<RecommendationId, ValidationError> {
        if chosen.len() != catalog.room_count() {
            return Err(ValidationError::IllegalTransition {
                chosen: chosen.len(),
                rooms: catalog.room_count(),
            });
        }

        let resolver = CompatibilityResolver::new(catalog);
        let matches: Vec<&Recommendation> = resolver.matching_recommendations(chosen).collect();

        let picked = match matches.as_slice() {
            [] => {
                let first_divergent_room = resolver.first_divergent_room(chosen);
                warn!(
                    ?first_divergent_room,
                    "complete selection matches no recommendation"
                );
                return Err(ValidationError::Incompatible {
                    chosen: chosen.to_vec(),
                    first_divergent_room,
                });
            }
            [only] => *only,
            several => self.break_tie(several)?,
        };

        debug!(
            recommendation = %picked.recommendation_id,
            candidates = matches.len(),
            "selection validated"
        );
        Ok(picked.recommendation_id.clone())
    }

    fn break_tie<'a>(
        &self,
        matches: &[&'a Recommendation],
    ) -> Result<&'a Recommendation, ValidationError> {
        let picked = match self.policy {
            TieBreakPolicy::RejectAmbiguous => None,
            TieBreakPolicy::FirstListed => matches.first().copied(),
            // min_by keeps the first of equal elements, so listing order breaks price ties
            TieBreakPolicy::CheapestThenListed => matches.iter().copied().min_by(|a, b| {
                a.total_price.amount.total_cmp(&b.total_price.amount)
            }),
        };
        picked.ok_or(ValidationError::Ambiguous {
            count: matches.len(),
        })
    }
}
