//! Conversational assistant for reservations.
//!
//! The orchestrator grounds the model with live context (today's date, the
//! room roster, this week's bookings, the caller's own bookings), then runs a
//! bounded tool loop: as long as the model answers with tool calls, execute
//! them in order and feed the outcomes back; a plain reply ends the dialogue.

mod tools;

pub use tools::{tool_specs, ToolDispatcher, ToolOutcome};
pub use tools::{TOOL_CANCEL_RESERVATION, TOOL_CREATE_RESERVATION};

use chrono::{Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::llm::{ChatMessage, ChatModel};
use crate::model::{Reservation, Room};
use crate::service::ReservationService;
use crate::storage::ReservationStore;

/// Hard cap on model round-trips per user message. When the model is still
/// asking for tools after this many rounds the dialogue ends with a fallback
/// reply instead of looping further.
pub const MAX_ROUNDS: usize = 5;

/// How many prior conversation turns are replayed to the model.
pub const MAX_HISTORY_TURNS: usize = 10;

const FALLBACK_REPLY: &str =
    "I couldn't finish that request. Please check your reservations and try again.";

/// Calendar context for the model and the quick-info endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekInfo {
    pub today: NaiveDate,
    pub day_of_week: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub next_days: Vec<DayInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayInfo {
    pub date: NaiveDate,
    pub day_name: String,
}

/// Build calendar context around `today`. Weeks run Monday through Sunday.
pub fn week_info(today: NaiveDate) -> WeekInfo {
    let week = today.week(Weekday::Mon);
    let next_days = (0..7)
        .map(|offset| {
            let date = today + Duration::days(offset);
            DayInfo {
                date,
                day_name: date.format("%A").to_string(),
            }
        })
        .collect();

    WeekInfo {
        today,
        day_of_week: today.format("%A").to_string(),
        week_start: week.first_day(),
        week_end: week.last_day(),
        next_days,
    }
}

/// One prior turn of the conversation, as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

/// Runs the bounded tool-call dialogue for one user message.
pub struct DialogueOrchestrator<'a, S, M> {
    service: &'a ReservationService<S>,
    model: &'a M,
}

impl<'a, S: ReservationStore, M: ChatModel> DialogueOrchestrator<'a, S, M> {
    pub fn new(service: &'a ReservationService<S>, model: &'a M) -> Self {
        Self { service, model }
    }

    /// Answer `message` for the authenticated user, executing reservation
    /// tools as the model requests them. `today` anchors all calendar context
    /// so behavior is deterministic under test.
    pub async fn run(
        &self,
        user_id: i64,
        username: &str,
        message: &str,
        history: &[HistoryTurn],
        today: NaiveDate,
    ) -> Result<String> {
        let week = week_info(today);
        let rooms = self.service.store().list_rooms().await?;
        let week_reservations = self
            .service
            .list_for_week(week.week_start, week.week_end)
            .await?;
        // Only bookings from today on; long-past reservations are not useful
        // context and are not cancellable in practice.
        let mine = self.service.list_for_user(user_id, today).await?;

        let mut messages = vec![ChatMessage::system(system_prompt(
            username,
            &week,
            &rooms,
            &week_reservations,
            &mine,
        ))];
        for turn in history.iter().rev().take(MAX_HISTORY_TURNS).rev() {
            match turn.role.as_str() {
                "user" => messages.push(ChatMessage::user(turn.content.clone())),
                "assistant" => messages.push(ChatMessage::assistant(turn.content.clone())),
                _ => {}
            }
        }
        messages.push(ChatMessage::user(message));

        let specs = tool_specs();
        let dispatcher = ToolDispatcher::new(self.service, user_id);

        for round in 0..MAX_ROUNDS {
            let reply = self.model.chat(&messages, &specs).await?;

            if reply.tool_calls().is_empty() {
                return Ok(reply.content.unwrap_or_default());
            }

            tracing::debug!(
                round,
                tools = reply.tool_calls().len(),
                user = user_id,
                "executing assistant tool calls"
            );

            let calls = reply.tool_calls().to_vec();
            messages.push(reply);
            for call in &calls {
                let outcome = dispatcher.dispatch(&call.function).await;
                messages.push(ChatMessage::tool_result(
                    call.id.clone(),
                    serde_json::to_string(&outcome)?,
                ));
            }
        }

        tracing::warn!(user = user_id, "dialogue exhausted its round budget");
        Ok(FALLBACK_REPLY.to_string())
    }
}

fn system_prompt(
    username: &str,
    week: &WeekInfo,
    rooms: &[Room],
    week_reservations: &[Reservation],
    mine: &[Reservation],
) -> String {
    let mut prompt = String::new();

    prompt.push_str("You are the booking assistant for a shared office. ");
    prompt.push_str("You help people find free rooms and manage their reservations.\n\n");

    prompt.push_str(&format!(
        "Today is {} ({}). The current week runs {} through {}.\n",
        week.today, week.day_of_week, week.week_start, week.week_end
    ));
    prompt.push_str(&format!("You are speaking with {username}.\n\n"));

    prompt.push_str("Rooms:\n");
    if rooms.is_empty() {
        prompt.push_str("- (no rooms registered)\n");
    }
    for room in rooms {
        prompt.push_str(&format!(
            "- id {}: {} (capacity {}){}\n",
            room.id,
            room.name,
            room.capacity,
            if room.description.is_empty() {
                String::new()
            } else {
                format!(" - {}", room.description)
            }
        ));
    }

    prompt.push_str("\nThis week's reservations:\n");
    if week_reservations.is_empty() {
        prompt.push_str("- (none)\n");
    }
    for r in week_reservations {
        prompt.push_str(&format_reservation_line(r));
    }

    prompt.push_str(&format!("\n{username}'s upcoming reservations:\n"));
    if mine.is_empty() {
        prompt.push_str("- (none)\n");
    }
    for r in mine {
        prompt.push_str(&format_reservation_line(r));
    }

    prompt.push_str(
        "\nRules:\n\
         - Reservations use 30-minute slots; times like 09:00 or 14:30.\n\
         - A slot's end time is exclusive: a booking ending 10:00 does not clash with one starting 10:00.\n\
         - Use create_reservation and cancel_reservation to act; never claim a booking happened without calling the tool.\n\
         - Users may only cancel their own reservations.\n\
         - If a slot is taken, say so and suggest the nearest free alternative.\n\
         - Answer briefly and in the user's language.\n",
    );

    prompt
}

fn format_reservation_line(r: &Reservation) -> String {
    format!(
        "- #{} {} {}-{} in {}{}\n",
        r.id,
        r.reservation_date,
        r.start_time.format("%H:%M"),
        r.end_time.format("%H:%M"),
        r.room_name.as_deref().unwrap_or("?"),
        r.username
            .as_deref()
            .map(|u| format!(" by {u}"))
            .unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HallpassError;
    use crate::llm::{FunctionCall, ToolCall};
    use crate::model::{RoomInput, User};
    use crate::storage::SqliteStorage;
    use crate::timeslot;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed script of replies; errors if asked for more.
    struct ScriptedModel {
        replies: Mutex<VecDeque<ChatMessage>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(replies: Vec<ChatMessage>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn rounds(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChatModel for ScriptedModel {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: &[serde_json::Value],
        ) -> crate::error::Result<ChatMessage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| HallpassError::Llm("script exhausted".into()))
        }
    }

    fn tool_reply(name: &str, arguments: serde_json::Value) -> ChatMessage {
        ChatMessage {
            role: "assistant".into(),
            content: None,
            tool_calls: Some(vec![ToolCall {
                id: "call_1".into(),
                kind: "function".into(),
                function: FunctionCall {
                    name: name.into(),
                    arguments: arguments.to_string(),
                },
            }]),
            tool_call_id: None,
        }
    }

    async fn fixture() -> (ReservationService<SqliteStorage>, User, i64) {
        let storage = SqliteStorage::open_in_memory().expect("in-memory DB");
        let user = storage.create_user("alice", "hash").await.unwrap();
        let room = storage
            .create_room(&RoomInput::new("Alpha", None, None).unwrap())
            .await
            .unwrap();
        (ReservationService::new(storage), user, room.id)
    }

    fn today() -> NaiveDate {
        timeslot::parse_date("2024-03-06").unwrap()
    }

    #[test]
    fn test_week_info_bounds() {
        // 2024-03-06 is a Wednesday.
        let info = week_info(today());
        assert_eq!(info.day_of_week, "Wednesday");
        assert_eq!(info.week_start, timeslot::parse_date("2024-03-04").unwrap());
        assert_eq!(info.week_end, timeslot::parse_date("2024-03-10").unwrap());
        assert_eq!(info.next_days.len(), 7);
        assert_eq!(info.next_days[0].day_name, "Wednesday");
        assert_eq!(info.next_days[6].day_name, "Tuesday");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["dayOfWeek"], "Wednesday");
        assert_eq!(json["weekStart"], "2024-03-04");
        assert!(json["nextDays"][0]["dayName"].is_string());
    }

    #[tokio::test]
    async fn test_plain_reply_takes_one_round() {
        let (service, user, _) = fixture().await;
        let model = ScriptedModel::new(vec![ChatMessage::assistant("Alpha is free at 9.")]);

        let reply = DialogueOrchestrator::new(&service, &model)
            .run(user.id, &user.username, "is alpha free tomorrow morning?", &[], today())
            .await
            .unwrap();

        assert_eq!(reply, "Alpha is free at 9.");
        assert_eq!(model.rounds(), 1);
    }

    #[tokio::test]
    async fn test_tool_round_creates_real_reservation() {
        let (service, user, room_id) = fixture().await;
        let model = ScriptedModel::new(vec![
            tool_reply(
                TOOL_CREATE_RESERVATION,
                serde_json::json!({
                    "room_id": room_id,
                    "date": "2024-03-07",
                    "start_time": "09:00",
                    "end_time": "10:00",
                }),
            ),
            ChatMessage::assistant("Done, Alpha is yours 9 to 10."),
        ]);

        let reply = DialogueOrchestrator::new(&service, &model)
            .run(user.id, &user.username, "book alpha tomorrow 9-10", &[], today())
            .await
            .unwrap();

        assert_eq!(reply, "Done, Alpha is yours 9 to 10.");
        assert_eq!(model.rounds(), 2);

        let mine = service.list_for_user(user.id, today()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(
            mine[0].reservation_date,
            timeslot::parse_date("2024-03-07").unwrap()
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_feeds_failure_back_and_continues() {
        let (service, user, _) = fixture().await;
        let model = ScriptedModel::new(vec![
            tool_reply("teleport_user", serde_json::json!({})),
            ChatMessage::assistant("I can't do that, sorry."),
        ]);

        let reply = DialogueOrchestrator::new(&service, &model)
            .run(user.id, &user.username, "teleport me", &[], today())
            .await
            .unwrap();

        assert_eq!(reply, "I can't do that, sorry.");
        assert!(service.list_for_user(user.id, today()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_round_budget_exhaustion_yields_fallback() {
        let (service, user, _) = fixture().await;
        // Always asks for another (unknown) tool, never answers.
        let model = ScriptedModel::new(
            (0..MAX_ROUNDS + 3)
                .map(|_| tool_reply("spin", serde_json::json!({})))
                .collect(),
        );

        let reply = DialogueOrchestrator::new(&service, &model)
            .run(user.id, &user.username, "loop forever", &[], today())
            .await
            .unwrap();

        assert_eq!(reply, FALLBACK_REPLY);
        assert_eq!(model.rounds(), MAX_ROUNDS);
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let (service, user, _) = fixture().await;
        let model = ScriptedModel::new(vec![]);

        let err = DialogueOrchestrator::new(&service, &model)
            .run(user.id, &user.username, "hello", &[], today())
            .await
            .unwrap_err();
        assert!(matches!(err, HallpassError::Llm(_)));
    }

    #[tokio::test]
    async fn test_system_prompt_carries_context() {
        let (service, user, room_id) = fixture().await;
        service
            .create(
                user.id,
                room_id,
                timeslot::parse_date("2024-03-07").unwrap(),
                timeslot::parse_time("09:00").unwrap(),
                timeslot::parse_time("10:00").unwrap(),
            )
            .await
            .unwrap();

        let week = week_info(today());
        let rooms = service.store().list_rooms().await.unwrap();
        let week_res = service
            .list_for_week(week.week_start, week.week_end)
            .await
            .unwrap();
        let mine = service.list_for_user(user.id, today()).await.unwrap();

        let prompt = system_prompt(&user.username, &week, &rooms, &week_res, &mine);
        assert!(prompt.contains("Today is 2024-03-06 (Wednesday)"));
        assert!(prompt.contains("Alpha"));
        assert!(prompt.contains("alice"));
        assert!(prompt.contains("09:00-10:00"));
        assert!(prompt.contains("30-minute"));
    }

    #[tokio::test]
    async fn test_prompt_context_omits_past_reservations() {
        let (service, user, room_id) = fixture().await;
        for d in ["2023-01-02", "2024-03-07"] {
            service
                .create(
                    user.id,
                    room_id,
                    timeslot::parse_date(d).unwrap(),
                    timeslot::parse_time("09:00").unwrap(),
                    timeslot::parse_time("10:00").unwrap(),
                )
                .await
                .unwrap();
        }

        let week = week_info(today());
        let rooms = service.store().list_rooms().await.unwrap();
        let week_res = service
            .list_for_week(week.week_start, week.week_end)
            .await
            .unwrap();
        let mine = service.list_for_user(user.id, today()).await.unwrap();

        let prompt = system_prompt(&user.username, &week, &rooms, &week_res, &mine);
        assert!(prompt.contains("2024-03-07"));
        assert!(!prompt.contains("2023-01-02"));
    }

    #[test]
    fn test_history_is_truncated_to_recent_turns() {
        let history: Vec<HistoryTurn> = (0..15)
            .map(|i| HistoryTurn {
                role: if i % 2 == 0 { "user" } else { "assistant" }.into(),
                content: format!("turn {i}"),
            })
            .collect();

        let kept: Vec<&HistoryTurn> = history
            .iter()
            .rev()
            .take(MAX_HISTORY_TURNS)
            .rev()
            .collect();
        assert_eq!(kept.len(), MAX_HISTORY_TURNS);
        assert_eq!(kept[0].content, "turn 5");
        assert_eq!(kept[9].content, "turn 14");
    }
}
