use crate::status::{ReservationStatus, Transition};

pub type MarketResult<T> = Result<T, MarketError>;

#[derive(thiserror::Error, Debug)]
pub enum MarketError {
    #[error("{kind} {id} was not found")]
    NotFound { kind: &'static str, id: String },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("cannot {transition:?} a reservation that is {from:?}")]
    InvalidTransition {
        from: ReservationStatus,
        transition: Transition,
    },
    #[error("failed to generate an identifier: {0}")]
    Identifier(String),
    #[error("storage failure")]
    Storage(#[from] sled::Error),
    #[error("failed to encode record")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("failed to decode record")]
    Decode(#[from] minicbor::decode::Error),
}

impl MarketError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}
