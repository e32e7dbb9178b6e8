// Sequential per-room rate selection

use crate::catalog::{Catalog, RateId, RateOption, RecommendationId};
use crate::config::EngineConfig;
use crate::resolver::CompatibilityResolver;
use crate::validator::{ValidationError, Validator};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("Rate {rate} is not available for room {room}")]
    InvalidSelection { room: usize, rate: RateId },

    #[error("Illegal transition: {0}")]
    IllegalTransition(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    AwaitingRoom(usize),
    Complete,
}

// What the engine hands to checkout
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedSelection {
    pub rates: Vec<RateId>,
    pub recommendation_id: RecommendationId,
}

// Value snapshot of one booking attempt. The cursor is the length of `chosen`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionState {
    chosen: Vec<RateId>,
    candidates: Vec<RateOption>,
}

impl SelectionState {
    pub fn chosen(&self) -> &[RateId] {
        &self.chosen
    }

    pub fn cursor(&self) -> usize {
        self.chosen.len()
    }

    // Empty once complete
    pub fn candidates(&self) -> &[RateOption] {
        &self.candidates
    }

    fn offers(&self, rate: &RateId) -> bool {
        self.candidates.iter().any(|option| &option.rate_id == rate)
    }
}

// One booking attempt over a shared catalog. Candidates are recomputed
// after every transition.
#[derive(Debug, Clone)]
pub struct SelectionStateMachine {
    catalog: Arc<Catalog>,
    validator: Validator,
    state: SelectionState,
}

impl SelectionStateMachine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_config(catalog, &EngineConfig::default())
    }

    pub fn with_config(catalog: Arc<Catalog>, config: &EngineConfig) -> Self {
        let mut machine = Self {
            catalog,
            validator: Validator::new(config.tie_break),
            state: SelectionState::default(),
        };
        machine.refresh_candidates();
        machine
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn chosen(&self) -> &[RateId] {
        self.state.chosen()
    }

    pub fn candidates(&self) -> &[RateOption] {
        self.state.candidates()
    }

    pub fn phase(&self) -> SelectionPhase {
        let cursor = self.state.cursor();
        if cursor >= self.catalog.room_count() {
            SelectionPhase::Complete
        } else {
            SelectionPhase::AwaitingRoom(cursor)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase() == SelectionPhase::Complete
    }

    pub fn select_rate(&mut self, rate: &RateId) -> Result<SelectionPhase, SelectionError> {
        let room = match self.phase() {
            SelectionPhase::AwaitingRoom(room) => room,
            SelectionPhase::Complete => {
                return Err(SelectionError::IllegalTransition(
                    "select_rate called after every room was chosen".to_string(),
                ));
            }
        };

        if !self.state.offers(rate) {
            warn!(room, rate = %rate, "rejected rate outside the candidate set");
            return Err(SelectionError::InvalidSelection {
                room,
                rate: rate.clone(),
            });
        }

        self.state.chosen.push(rate.clone());
        self.refresh_candidates();

        let phase = self.phase();
        debug!(room, rate = %rate, ?phase, "rate selected");
        Ok(phase)
    }

    // Rejects a rate meant for a room other than the current one
    pub fn select_rate_for_room(
        &mut self,
        room: usize,
        rate: &RateId,
    ) -> Result<SelectionPhase, SelectionError> {
        if let SelectionPhase::AwaitingRoom(current) = self.phase() {
            if current != room {
                warn!(room, current, rate = %rate, "selection for a room that is not current");
                return Err(SelectionError::InvalidSelection {
                    room,
                    rate: rate.clone(),
                });
            }
        }
        self.select_rate(rate)
    }

    // No-op on the first room
    pub fn go_back(&mut self) -> SelectionPhase {
        if self.state.chosen.pop().is_some() {
            self.refresh_candidates();
            debug!(phase = ?self.phase(), "stepped back");
        }
        self.phase()
    }

    // Keeps the choices for rooms before `room`
    pub fn rewind_to(&mut self, room: usize) -> SelectionPhase {
        if room < self.state.chosen.len() {
            self.state.chosen.truncate(room);
            self.refresh_candidates();
            debug!(room, "rewound selection");
        }
        self.phase()
    }

    pub fn reset(&mut self) {
        self.state.chosen.clear();
        self.refresh_candidates();
        debug!("selection reset");
    }

    pub fn validate(&self) -> Result<RecommendationId, SelectionError> {
        if !self.is_complete() {
            return Err(SelectionError::IllegalTransition(format!(
                "validate called with {} of {} rooms chosen",
                self.state.cursor(),
                self.catalog.room_count()
            )));
        }
        Ok(self.validator.validate(&self.catalog, self.chosen())?)
    }

    pub fn confirm(&self) -> Result<ConfirmedSelection, SelectionError> {
        let recommendation_id = self.validate()?;
        info!(
            recommendation = %recommendation_id,
            rooms = self.catalog.room_count(),
            "selection confirmed"
        );
        Ok(ConfirmedSelection {
            rates: self.state.chosen.clone(),
            recommendation_id,
        })
    }

    fn refresh_candidates(&mut self) {
        self.state.candidates = CompatibilityResolver::new(&self.catalog).resolve(&self.state.chosen);
        if self.state.candidates.is_empty() && !self.is_complete() {
            warn!(
                room = self.state.cursor(),
                "no compatible rates for the current room"
            );
        }
    }
}
