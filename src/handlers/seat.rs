//! 选座：特殊需求优先前排，其次指定座位、偏好，最后取默认区域第一个空位

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::handlers::{entity_value, AgentContext, Capability, GroundingData};
use crate::intent::ClassificationResult;

static COLUMNS: [char; 6] = ['A', 'B', 'C', 'D', 'E', 'F'];
const ROWS: std::ops::RangeInclusive<u32> = 1..=30;
const TAKEN: &[&str] = &["1B", "2A", "14C", "14D", "23A", "23B"];

fn row_seats(row: u32) -> impl Iterator<Item = String> {
    COLUMNS.iter().map(move |c| format!("{}{}", row, c))
}

fn column_seats(columns: &'static [char]) -> impl Iterator<Item = String> {
    columns
        .iter()
        .flat_map(|c| ROWS.map(move |row| format!("{}{}", row, c)))
}

fn is_taken(seat: &str) -> bool {
    TAKEN.iter().any(|t| t.eq_ignore_ascii_case(seat))
}

fn first_free(mut candidates: impl Iterator<Item = String>) -> Option<String> {
    candidates.find(|s| !is_taken(s))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatPreference {
    Window,
    Aisle,
    Front,
    Exit,
    Middle,
}

impl SeatPreference {
    pub fn parse(text: &str) -> Option<Self> {
        let t = text.to_lowercase();
        if t.contains("window") {
            Some(SeatPreference::Window)
        } else if t.contains("aisle") {
            Some(SeatPreference::Aisle)
        } else if t.contains("front") {
            Some(SeatPreference::Front)
        } else if t.contains("exit") {
            Some(SeatPreference::Exit)
        } else if t.contains("middle") {
            Some(SeatPreference::Middle)
        } else {
            None
        }
    }

    fn candidates(self) -> Box<dyn Iterator<Item = String>> {
        match self {
            SeatPreference::Window => Box::new(column_seats(&['A', 'F'])),
            SeatPreference::Aisle => Box::new(column_seats(&['C', 'D'])),
            SeatPreference::Front => Box::new(row_seats(1)),
            SeatPreference::Exit => Box::new(row_seats(14)),
            SeatPreference::Middle => Box::new(column_seats(&['B'])),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeatRequest {
    pub confirmation_number: Option<String>,
    pub flight_number: Option<String>,
    pub requested_seat: Option<String>,
    pub preference: Option<SeatPreference>,
    pub special_needs: Option<String>,
    pub question: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatResponse {
    pub success: bool,
    pub seat_number: Option<String>,
    pub previous_seat: Option<String>,
    pub seat_facts: Vec<String>,
    pub reasoning: String,
    pub special_service_noted: bool,
}

pub struct SeatHandler {
    data: Arc<GroundingData>,
}

impl SeatHandler {
    pub fn new(data: Arc<GroundingData>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl Capability for SeatHandler {
    type Request = SeatRequest;
    type Response = SeatResponse;

    fn build_request(&self, classification: &ClassificationResult) -> SeatRequest {
        let question = classification.rewritten_prompt().to_string();
        let preference = entity_value(classification, &["seat_preference", "preference"])
            .and_then(|p| SeatPreference::parse(&p))
            .or_else(|| SeatPreference::parse(&question));
        SeatRequest {
            confirmation_number: entity_value(classification, &["confirmation_number", "booking_id"]),
            flight_number: entity_value(classification, &["flight_number"]),
            requested_seat: entity_value(classification, &["seat_number", "seat", "requested_seat"]),
            preference,
            special_needs: entity_value(classification, &["special_needs", "assistance"]),
            question,
        }
    }

    async fn execute(&self, request: SeatRequest, context: &AgentContext) -> SeatResponse {
        let previous_seat = request
            .confirmation_number
            .as_deref()
            .or(context.confirmation_number.as_deref())
            .and_then(|c| self.data.itinerary_by_confirmation(c))
            .map(|i| i.seat_number.clone());

        let mut seat_facts = Vec::new();
        let mut special_service_noted = false;

        let mut selected = if let Some(needs) = &request.special_needs {
            let seat = first_free(row_seats(1));
            if seat.is_some() {
                special_service_noted = true;
                seat_facts.push(format!("Special service request noted: {}", needs));
            }
            seat
        } else if let Some(wanted) = &request.requested_seat {
            let wanted = wanted.trim().to_uppercase();
            if is_taken(&wanted) {
                seat_facts.push(format!("Requested seat {} is already taken", wanted));
                None
            } else {
                Some(wanted)
            }
        } else if let Some(preference) = request.preference {
            first_free(preference.candidates())
        } else {
            None
        };

        if selected.is_none() {
            selected = first_free((5..=24).flat_map(row_seats));
        }

        let Some(seat) = selected else {
            return SeatResponse {
                success: false,
                seat_number: None,
                previous_seat,
                seat_facts: vec!["No available seat matches the preferences".to_string()],
                reasoning: "Seat map has no free seat for this request - refer to customer service".to_string(),
                special_service_noted: false,
            };
        };

        let reasoning = if special_service_noted {
            seat_facts.push("A crew member will assist during boarding".to_string());
            format!("Assigned front-row seat {} for special service needs", seat)
        } else if let Some(previous) = &previous_seat {
            seat_facts.push(format!("Seat changed from {} to {}", previous, seat));
            seat_facts.push("Boarding pass will be updated".to_string());
            format!("Changed seat from {} to {}", previous, seat)
        } else {
            seat_facts.push(format!("Seat {} assigned", seat));
            format!("Assigned seat {}", seat)
        };

        SeatResponse {
            success: true,
            seat_number: Some(seat),
            previous_seat,
            seat_facts,
            reasoning,
            special_service_noted,
        }
    }
}
