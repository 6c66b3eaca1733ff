use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::concierge::listing::PropertyId;
use crate::concierge::visits::VisitId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConciergeError {
    #[error("session {0} not found")]
    UnknownSession(String),

    #[error("property {0} not found")]
    UnknownProperty(PropertyId),

    #[error("no listing at {0}")]
    UnknownAddress(String),

    #[error("visit {0} not found")]
    UnknownVisit(VisitId),

    #[error("no property is selected")]
    NoPropertySelected,

    #[error("the intake chat is not waiting for an answer")]
    IntakeNotAwaitingAnswer,

    #[error("answer is empty")]
    EmptyAnswer,

    #[error("'{0}' is not an option for the current question")]
    UnknownOption(String),

    #[error("both a date and a time are required")]
    ScheduleIncomplete,

    #[error("the schedule form is not open")]
    ScheduleFormClosed,

    #[error("invalid mortgage input: {0}")]
    InvalidMortgageInput(String),

    #[error("select at least two properties to compare")]
    CompareNeedsTwo,

    #[error("compare mode is not active")]
    CompareInactive,

    #[error("property chat is not open")]
    PropertyChatClosed,

    #[error("query is empty")]
    EmptyQuery,
}

impl ConciergeError {
    pub fn code(&self) -> &'static str {
        match self {
            ConciergeError::UnknownSession(_) => "unknown_session",
            ConciergeError::UnknownProperty(_) => "unknown_property",
            ConciergeError::UnknownAddress(_) => "unknown_address",
            ConciergeError::UnknownVisit(_) => "unknown_visit",
            ConciergeError::NoPropertySelected => "no_property_selected",
            ConciergeError::IntakeNotAwaitingAnswer => "intake_not_awaiting_answer",
            ConciergeError::EmptyAnswer => "empty_answer",
            ConciergeError::UnknownOption(_) => "unknown_option",
            ConciergeError::ScheduleIncomplete => "schedule_incomplete",
            ConciergeError::ScheduleFormClosed => "schedule_form_closed",
            ConciergeError::InvalidMortgageInput(_) => "invalid_mortgage_input",
            ConciergeError::CompareNeedsTwo => "compare_needs_two",
            ConciergeError::CompareInactive => "compare_inactive",
            ConciergeError::PropertyChatClosed => "property_chat_closed",
            ConciergeError::EmptyQuery => "empty_query",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ConciergeError::UnknownSession(_)
            | ConciergeError::UnknownProperty(_)
            | ConciergeError::UnknownAddress(_)
            | ConciergeError::UnknownVisit(_) => StatusCode::NOT_FOUND,
            ConciergeError::EmptyAnswer
            | ConciergeError::UnknownOption(_)
            | ConciergeError::ScheduleIncomplete
            | ConciergeError::InvalidMortgageInput(_)
            | ConciergeError::EmptyQuery => StatusCode::UNPROCESSABLE_ENTITY,
            ConciergeError::NoPropertySelected
            | ConciergeError::IntakeNotAwaitingAnswer
            | ConciergeError::ScheduleFormClosed
            | ConciergeError::CompareNeedsTwo
            | ConciergeError::CompareInactive
            | ConciergeError::PropertyChatClosed => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ConciergeError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
