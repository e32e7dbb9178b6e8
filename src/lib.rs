// Multi-room rate selection and compatibility engine for hotel checkout

// Engine core
pub mod catalog;
pub mod resolver;
pub mod selection;
pub mod validator;

// Configuration, ingestion and the booking backend boundary
pub mod availability_xml;
pub mod booking;
pub mod client;
pub mod config;
pub mod store;
pub mod supplier;
pub mod xml_response;

// Re-export key types for convenience
pub use availability_xml::{AvailabilityProcessor, ProcessingError};
pub use booking::{checkout, AllocationResponse, CheckoutError, RoomAllocation, RoomAllocationRequest};
pub use catalog::{
    Catalog, CatalogError, Price, RateId, RateOption, Recommendation, RecommendationId, Room,
    RoomId,
};
pub use client::{ApiError, BookingBackend, ClientError, ClientStats, HttpBookingBackend};
pub use config::{BackendConfig, BookingConfig, CatalogStoreConfig, EngineConfig, RetryConfig};
pub use resolver::CompatibilityResolver;
pub use selection::{
    ConfirmedSelection, SelectionError, SelectionPhase, SelectionState, SelectionStateMachine,
};
pub use store::{CatalogStore, StoreStatsReport};
pub use supplier::CatalogResponse;
pub use validator::{TieBreakPolicy, ValidationError, Validator};
