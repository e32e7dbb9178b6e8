// Catalog: the immutable per-itinerary snapshot of rooms, candidate rates and
// the supplier recommendations that bundle them.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

// Error types for catalog construction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("Catalog inconsistency: no rooms requested")]
    NoRooms,

    #[error("Catalog inconsistency: {rooms} rooms but {rate_lists} rate lists")]
    RateListCountMismatch { rooms: usize, rate_lists: usize },

    #[error("Catalog inconsistency: no recommendations")]
    NoRecommendations,

    #[error("Catalog inconsistency: price in {found} in a catalog priced in {expected}")]
    CurrencyMismatch { expected: String, found: String },

    #[error("Catalog inconsistency: rate {rate} listed twice for room {room}")]
    DuplicateRate { room: usize, rate: RateId },

    #[error("Catalog inconsistency: recommendation {0} listed twice")]
    DuplicateRecommendation(RecommendationId),

    #[error("Catalog inconsistency: recommendation {recommendation} has {found} rates, expected {expected}")]
    RateCountMismatch {
        recommendation: RecommendationId,
        expected: usize,
        found: usize,
    },

    #[error("Catalog inconsistency: recommendation {recommendation} references unknown rate {rate} for room {room}")]
    UnknownRate {
        recommendation: RecommendationId,
        room: usize,
        rate: RateId,
    },

    #[error("Catalog inconsistency: rate {rate} of room {room} claims membership in {recommendation}")]
    MembershipMismatch {
        room: usize,
        rate: RateId,
        recommendation: RecommendationId,
    },
}

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(RoomId);
// Unique within one room's candidate list
string_id!(RateId);
// What the booking API needs to finalize a purchase
string_id!(RecommendationId);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

impl Price {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

// One occupancy unit requested by the guest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: RoomId,
    pub adults: u32,
    #[serde(default)]
    pub child_ages: Vec<u32>,
}

impl Room {
    pub fn new(room_id: impl Into<RoomId>, adults: u32, child_ages: Vec<u32>) -> Self {
        Self {
            room_id: room_id.into(),
            adults,
            child_ages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateOption {
    pub rate_id: RateId,
    // Filled in from the recommendations when the catalog is built
    #[serde(default)]
    pub recommendation_ids: Vec<RecommendationId>,
    pub price: Price,
    #[serde(default)]
    pub board_basis: String,
    #[serde(default)]
    pub refundable: bool,
}

impl RateOption {
    pub fn new(rate_id: impl Into<RateId>, price: Price) -> Self {
        Self {
            rate_id: rate_id.into(),
            recommendation_ids: Vec::new(),
            price,
            board_basis: String::new(),
            refundable: false,
        }
    }
}

// A supplier bundle: one legal way to book all rooms together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub recommendation_id: RecommendationId,
    // Index i holds the rate for room i
    pub rates: Vec<RateId>,
    pub total_price: Price,
}

impl Recommendation {
    pub fn new(
        recommendation_id: impl Into<RecommendationId>,
        rates: Vec<RateId>,
        total_price: Price,
    ) -> Self {
        Self {
            recommendation_id: recommendation_id.into(),
            rates,
            total_price,
        }
    }

    pub fn rate_for(&self, room: usize) -> Option<&RateId> {
        self.rates.get(room)
    }
}

// Immutable per-itinerary snapshot. Construction fails fast on any
// inconsistency so the state machine never sees a rate it cannot look up.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    rooms: Vec<Room>,
    rates: Vec<Vec<RateOption>>,
    recommendations: Vec<Recommendation>,
}

impl Catalog {
    pub fn new(
        rooms: Vec<Room>,
        mut rates: Vec<Vec<RateOption>>,
        recommendations: Vec<Recommendation>,
    ) -> Result<Self, CatalogError> {
        if rooms.is_empty() {
            return Err(CatalogError::NoRooms);
        }
        if rates.len() != rooms.len() {
            return Err(CatalogError::RateListCountMismatch {
                rooms: rooms.len(),
                rate_lists: rates.len(),
            });
        }

        let currency = match recommendations.first() {
            Some(first) => first.total_price.currency.clone(),
            None => return Err(CatalogError::NoRecommendations),
        };

        // Bundles are ranked by amount, so every price must be in one currency
        let stray = recommendations
            .iter()
            .map(|recommendation| &recommendation.total_price)
            .chain(rates.iter().flatten().map(|option| &option.price))
            .find(|price| price.currency != currency);
        if let Some(price) = stray {
            return Err(CatalogError::CurrencyMismatch {
                expected: currency,
                found: price.currency.clone(),
            });
        }

        // Per room: rate id -> position in the candidate list
        let mut positions: Vec<HashMap<RateId, usize>> = Vec::with_capacity(rates.len());
        for (room, options) in rates.iter().enumerate() {
            let mut index = HashMap::with_capacity(options.len());
            for (position, option) in options.iter().enumerate() {
                if index.insert(option.rate_id.clone(), position).is_some() {
                    return Err(CatalogError::DuplicateRate {
                        room,
                        rate: option.rate_id.clone(),
                    });
                }
            }
            positions.push(index);
        }

        // Membership actually implied by the recommendations
        let mut membership: Vec<Vec<Vec<RecommendationId>>> = rates
            .iter()
            .map(|options| vec![Vec::new(); options.len()])
            .collect();
        let mut seen = HashSet::with_capacity(recommendations.len());

        for recommendation in &recommendations {
            if !seen.insert(recommendation.recommendation_id.clone()) {
                return Err(CatalogError::DuplicateRecommendation(
                    recommendation.recommendation_id.clone(),
                ));
            }
            if recommendation.rates.len() != rooms.len() {
                return Err(CatalogError::RateCountMismatch {
                    recommendation: recommendation.recommendation_id.clone(),
                    expected: rooms.len(),
                    found: recommendation.rates.len(),
                });
            }
            for (room, rate) in recommendation.rates.iter().enumerate() {
                let position = positions
                    .get(room)
                    .and_then(|index| index.get(rate))
                    .copied()
                    .ok_or_else(|| {
                        warn!(
                            recommendation = %recommendation.recommendation_id,
                            room,
                            rate = %rate,
                            "recommendation references a rate missing from the room's candidates"
                        );
                        CatalogError::UnknownRate {
                            recommendation: recommendation.recommendation_id.clone(),
                            room,
                            rate: rate.clone(),
                        }
                    })?;
                if let Some(members) = membership
                    .get_mut(room)
                    .and_then(|room_members| room_members.get_mut(position))
                {
                    members.push(recommendation.recommendation_id.clone());
                }
            }
        }

        // Declared membership must agree with the bundles; empty means "derive it"
        for (room, (options, derived)) in rates.iter_mut().zip(membership).enumerate() {
            for (option, derived) in options.iter_mut().zip(derived) {
                if let Some(stray) = option
                    .recommendation_ids
                    .iter()
                    .find(|declared| !derived.contains(declared))
                {
                    return Err(CatalogError::MembershipMismatch {
                        room,
                        rate: option.rate_id.clone(),
                        recommendation: stray.clone(),
                    });
                }
                option.recommendation_ids = derived;
            }
        }

        debug!(
            rooms = rooms.len(),
            recommendations = recommendations.len(),
            "catalog built"
        );

        Ok(Self {
            rooms,
            rates,
            recommendations,
        })
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    // Full candidate list for a room, in supplier order
    pub fn rates_for(&self, room: usize) -> &[RateOption] {
        self.rates.get(room).map_or(&[], Vec::as_slice)
    }

    pub fn rate(&self, room: usize, rate_id: &RateId) -> Option<&RateOption> {
        self.rates_for(room)
            .iter()
            .find(|option| &option.rate_id == rate_id)
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn recommendation(&self, id: &RecommendationId) -> Option<&Recommendation> {
        self.recommendations
            .iter()
            .find(|recommendation| &recommendation.recommendation_id == id)
    }
}
