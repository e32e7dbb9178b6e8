use crate::catalog::{
    Catalog, CatalogError, Price, RateId, RateOption, Recommendation, RecommendationId, Room,
    RoomId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Data structures for the backend's itinerary rates response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogResponse {
    pub itinerary_id: String,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub rooms: Vec<SupplierRoom>,
    pub recommendations: Vec<SupplierRecommendation>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SupplierRoom {
    pub room_id: String,
    pub adults: u32,
    #[serde(default)]
    pub child_ages: Vec<u32>,
    pub rates: Vec<SupplierRate>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SupplierRate {
    pub rate_id: String,
    pub price: f64,
    #[serde(default)]
    pub board_type: String,
    #[serde(default)]
    pub refundable: bool,
    #[serde(default)]
    pub recommendation_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SupplierRecommendation {
    pub recommendation_id: String,
    pub rate_ids: Vec<String>,
    pub total_price: f64,
}

impl TryFrom<CatalogResponse> for Catalog {
    type Error = CatalogError;

    fn try_from(item: CatalogResponse) -> Result<Self, Self::Error> {
        let currency = item.currency;
        let mut rooms = Vec::with_capacity(item.rooms.len());
        let mut rates = Vec::with_capacity(item.rooms.len());

        for room in item.rooms {
            rooms.push(Room {
                room_id: RoomId::new(room.room_id),
                adults: room.adults,
                child_ages: room.child_ages,
            });
            rates.push(
                room.rates
                    .into_iter()
                    .map(|rate| RateOption {
                        rate_id: RateId::new(rate.rate_id),
                        recommendation_ids: rate
                            .recommendation_ids
                            .into_iter()
                            .map(RecommendationId::new)
                            .collect(),
                        price: Price::new(rate.price, currency.clone()),
                        board_basis: rate.board_type,
                        refundable: rate.refundable,
                    })
                    .collect(),
            );
        }

        let recommendations = item
            .recommendations
            .into_iter()
            .map(|recommendation| Recommendation {
                recommendation_id: RecommendationId::new(recommendation.recommendation_id),
                rates: recommendation.rate_ids.into_iter().map(RateId::new).collect(),
                total_price: Price::new(recommendation.total_price, currency.clone()),
            })
            .collect();

        Catalog::new(rooms, rates, recommendations)
    }
}
