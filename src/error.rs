//! Error taxonomy for the room engine and protocol layer (spec §7).
//!
//! `RoomError` and `ManagerError` are the internal, typed failures the
//! engine produces; `ApiError` is the wire-facing `{code, message}` shape
//! both map onto, reusing HTTP status codes per spec §7.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::identity::{ClientId, RoomId};
use crate::wire::ApiError;

/// Failures from operations on a single room (spec §4.2).
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room {0} is full")]
    Full(RoomId),
    #[error("invalid secret provided for client with ID {0}")]
    InvalidSecret(ClientId),
    #[error("no matching client with ID {0}")]
    NoSuchClient(ClientId),
    #[error("room is closing, no further state transitions are permitted")]
    Closing,
    #[error("client is already connected to a room")]
    AlreadyConnected,
    #[error("must be connected to a room for this action")]
    NotConnected,
}

/// Failures from operations on the room manager (spec §4.3).
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("no room found with ID {0}")]
    NoRoomFound(RoomId),
    #[error("creating this room would exceed the committed client budget ({0}/{1})")]
    TooManyCommittedClients(i32, i32),
    #[error("room must have a maximum clients value of 1 or more, {0} is invalid")]
    MaxClientsTooSmall(i32),
}

impl RoomError {
    /// HTTP-style status code this failure maps onto (spec §7).
    pub fn http_status(&self) -> i32 {
        match self {
            RoomError::Full(_)
            | RoomError::InvalidSecret(_)
            | RoomError::NoSuchClient(_)
            | RoomError::Closing
            | RoomError::AlreadyConnected
            | RoomError::NotConnected => 400,
        }
    }
}

impl ManagerError {
    /// HTTP-style status code this failure maps onto (spec §7).
    pub fn http_status(&self) -> i32 {
        match self {
            ManagerError::NoRoomFound(_) => 404,
            ManagerError::TooManyCommittedClients(_, _) | ManagerError::MaxClientsTooSmall(_) => {
                400
            }
        }
    }
}

const INTERNAL_SERVER_ERROR_MESSAGE: &str = "An internal server error occurred";

impl From<&RoomError> for ApiError {
    fn from(err: &RoomError) -> Self {
        ApiError {
            code: err.http_status(),
            message: err.to_string(),
        }
    }
}

impl From<&ManagerError> for ApiError {
    fn from(err: &ManagerError) -> Self {
        ApiError {
            code: err.http_status(),
            message: err.to_string(),
        }
    }
}

impl ResponseError for RoomError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status() as u16).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let body: ApiError = self.into();
        HttpResponse::build(<Self as ResponseError>::status_code(self)).json(body)
    }
}

impl ResponseError for ManagerError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status() as u16).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let body: ApiError = self.into();
        HttpResponse::build(<Self as ResponseError>::status_code(self)).json(body)
    }
}

/// Builds the client-visible error for an unexpected internal failure,
/// logging the real cause and replacing the message with a generic one
/// (spec §7: "Internal 500s are logged and the message replaced").
pub fn internal_error(context: &str) -> ApiError {
    log::error!("{context}");
    ApiError {
        code: 500,
        message: INTERNAL_SERVER_ERROR_MESSAGE.to_string(),
    }
}
