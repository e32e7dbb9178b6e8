// Booking finalization: turns a confirmed selection into the room
// allocation payload and submits it

use crate::catalog::{Catalog, RateId, RecommendationId, RoomId};
use crate::client::{ApiError, BookingBackend};
use crate::selection::{ConfirmedSelection, SelectionError, SelectionStateMachine};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Selection cannot be booked: {0}")]
    Selection(#[from] SelectionError),

    #[error("Room allocation failed: {0}")]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomAllocation {
    pub room_id: RoomId,
    pub rate_id: RateId,
    pub adults: u32,
    pub child_ages: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomAllocationRequest {
    pub itinerary_id: String,
    pub recommendation_id: RecommendationId,
    pub rooms: Vec<RoomAllocation>,
    // Lets the backend drop duplicates when a submission is retried
    pub idempotency_key: String,
}

impl RoomAllocationRequest {
    pub fn new(
        itinerary_id: impl Into<String>,
        catalog: &Catalog,
        confirmed: &ConfirmedSelection,
    ) -> Self {
        let rooms = catalog
            .rooms()
            .iter()
            .zip(&confirmed.rates)
            .map(|(room, rate)| RoomAllocation {
                room_id: room.room_id.clone(),
                rate_id: rate.clone(),
                adults: room.adults,
                child_ages: room.child_ages.clone(),
            })
            .collect();

        Self {
            itinerary_id: itinerary_id.into(),
            recommendation_id: confirmed.recommendation_id.clone(),
            rooms,
            idempotency_key: format!("{:016x}", rand::random::<u64>()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResponse {
    pub booking_id: String,
    pub status: String,
    pub confirmation_code: Option<String>,
}

// The machine is left as it was, so a failed submission can be retried
pub async fn checkout<B>(
    backend: &B,
    itinerary_id: &str,
    machine: &SelectionStateMachine,
) -> Result<AllocationResponse, CheckoutError>
where
    B: BookingBackend + ?Sized,
{
    let confirmed = machine.confirm()?;
    let request = RoomAllocationRequest::new(itinerary_id, machine.catalog(), &confirmed);

    match backend.allocate_rooms(&request).await {
        Ok(response) => {
            info!(
                itinerary_id,
                booking_id = %response.booking_id,
                recommendation = %request.recommendation_id,
                "rooms allocated"
            );
            Ok(response)
        }
        Err(e) => {
            warn!(itinerary_id, error = %e, "room allocation failed");
            Err(e.into())
        }
    }
}
