//! Assistant-facing reservation tools.
//!
//! The dispatcher sits between the model and [`ReservationService`]: it turns
//! untyped tool calls into typed service calls, and turns every result (good
//! or bad) into a [`ToolOutcome`] the model can read. Nothing here propagates
//! an error; a failed tool is information for the model, not an HTTP failure.

use serde::{Deserialize, Serialize};

use crate::llm::FunctionCall;
use crate::model::Reservation;
use crate::service::ReservationService;
use crate::storage::ReservationStore;
use crate::timeslot;

pub const TOOL_CREATE_RESERVATION: &str = "create_reservation";
pub const TOOL_CANCEL_RESERVATION: &str = "cancel_reservation";

/// Tool declarations in OpenAI function-calling format.
pub fn tool_specs() -> Vec<serde_json::Value> {
    vec![
        serde_json::json!({
            "type": "function",
            "function": {
                "name": TOOL_CREATE_RESERVATION,
                "description": "Reserve a room for the current user on a given date and time slot. Times must be on 30-minute boundaries.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "room_id": {
                            "type": "integer",
                            "description": "ID of the room to reserve"
                        },
                        "date": {
                            "type": "string",
                            "description": "Reservation date in YYYY-MM-DD format"
                        },
                        "start_time": {
                            "type": "string",
                            "description": "Start time in HH:MM format (e.g. 09:00, 14:30)"
                        },
                        "end_time": {
                            "type": "string",
                            "description": "End time in HH:MM format, after start_time"
                        }
                    },
                    "required": ["room_id", "date", "start_time", "end_time"]
                }
            }
        }),
        serde_json::json!({
            "type": "function",
            "function": {
                "name": TOOL_CANCEL_RESERVATION,
                "description": "Cancel one of the current user's reservations by its ID.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "reservation_id": {
                            "type": "integer",
                            "description": "ID of the reservation to cancel"
                        }
                    },
                    "required": ["reservation_id"]
                }
            }
        }),
    ]
}

#[derive(Debug, Deserialize)]
struct CreateReservationArgs {
    room_id: i64,
    date: String,
    start_time: String,
    end_time: String,
}

#[derive(Debug, Deserialize)]
struct CancelReservationArgs {
    reservation_id: i64,
}

/// What a tool execution produced, serialized back to the model as the
/// tool-result turn.
#[derive(Debug, Serialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation: Option<Reservation>,
}

impl ToolOutcome {
    fn ok(message: impl Into<String>, reservation: Option<Reservation>) -> Self {
        Self {
            success: true,
            message: message.into(),
            reservation,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            reservation: None,
        }
    }
}

/// Executes tool calls on behalf of one authenticated user.
pub struct ToolDispatcher<'a, S> {
    service: &'a ReservationService<S>,
    user_id: i64,
}

impl<'a, S: ReservationStore> ToolDispatcher<'a, S> {
    pub fn new(service: &'a ReservationService<S>, user_id: i64) -> Self {
        Self { service, user_id }
    }

    /// Execute one tool call. Always returns an outcome: malformed arguments,
    /// domain rejections, and unknown tool names all become `success: false`.
    pub async fn dispatch(&self, call: &FunctionCall) -> ToolOutcome {
        match call.name.as_str() {
            TOOL_CREATE_RESERVATION => self.create(&call.arguments).await,
            TOOL_CANCEL_RESERVATION => self.cancel(&call.arguments).await,
            other => ToolOutcome::fail(format!("unknown capability '{other}'")),
        }
    }

    async fn create(&self, arguments: &str) -> ToolOutcome {
        let args: CreateReservationArgs = match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => return ToolOutcome::fail(format!("invalid arguments: {e}")),
        };

        let date = match timeslot::parse_date(&args.date) {
            Ok(date) => date,
            Err(e) => return ToolOutcome::fail(e.to_string()),
        };
        let start = match timeslot::parse_time(&args.start_time) {
            Ok(time) => time,
            Err(e) => return ToolOutcome::fail(e.to_string()),
        };
        let end = match timeslot::parse_time(&args.end_time) {
            Ok(time) => time,
            Err(e) => return ToolOutcome::fail(e.to_string()),
        };

        match self
            .service
            .create(self.user_id, args.room_id, date, start, end)
            .await
        {
            Ok(reservation) => {
                let room = reservation
                    .room_name
                    .clone()
                    .unwrap_or_else(|| format!("room {}", reservation.room_id));
                ToolOutcome::ok(
                    format!(
                        "Reserved {room} on {} from {} to {}.",
                        args.date, args.start_time, args.end_time
                    ),
                    Some(reservation),
                )
            }
            Err(e) => ToolOutcome::fail(e.to_string()),
        }
    }

    async fn cancel(&self, arguments: &str) -> ToolOutcome {
        let args: CancelReservationArgs = match serde_json::from_str(arguments) {
            Ok(args) => args,
            Err(e) => return ToolOutcome::fail(format!("invalid arguments: {e}")),
        };

        match self.service.cancel(self.user_id, args.reservation_id).await {
            Ok(()) => ToolOutcome::ok(
                format!("Reservation {} cancelled.", args.reservation_id),
                None,
            ),
            Err(e) => ToolOutcome::fail(e.to_string()),
        }
    }
}
