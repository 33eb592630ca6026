//! 订票与退票

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::handlers::{entity_value, reference_code, AgentContext, Capability, GroundingData, Itinerary};
use crate::intent::ClassificationResult;

const MOCK_REFUND: f64 = 250.0;
const SEAT_COLUMNS: [char; 6] = ['A', 'B', 'C', 'D', 'E', 'F'];

#[derive(Debug, Clone, Default)]
pub struct BookFlightRequest {
    pub flight_number: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub date: Option<String>,
    pub passenger_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookFlightResponse {
    pub success: bool,
    pub booking_facts: Vec<String>,
    pub reasoning: String,
    pub confirmation_number: Option<String>,
    pub flight_number: Option<String>,
    pub seat_assignment: Option<String>,
}

pub struct BookFlightHandler {
    data: Arc<GroundingData>,
}

impl BookFlightHandler {
    pub fn new(data: Arc<GroundingData>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl Capability for BookFlightHandler {
    type Request = BookFlightRequest;
    type Response = BookFlightResponse;

    fn build_request(&self, classification: &ClassificationResult) -> BookFlightRequest {
        BookFlightRequest {
            flight_number: entity_value(classification, &["flight_number"]),
            origin: entity_value(classification, &["origin", "departure_city"]),
            destination: entity_value(classification, &["destination", "arrival_city"]),
            date: entity_value(classification, &["date", "travel_date"]),
            passenger_name: entity_value(classification, &["passenger_name", "name"]),
        }
    }

    async fn execute(&self, request: BookFlightRequest, context: &AgentContext) -> BookFlightResponse {
        let candidates = self
            .data
            .available_flights(request.origin.as_deref(), request.destination.as_deref());

        let selected = request
            .flight_number
            .as_deref()
            .and_then(|wanted| {
                candidates
                    .iter()
                    .find(|f| f.flight_number.eq_ignore_ascii_case(wanted))
            })
            .or_else(|| candidates.first())
            .copied();

        let Some(flight) = selected else {
            return BookFlightResponse {
                success: false,
                booking_facts: vec![
                    "No available flights match the request".to_string(),
                    format!("Origin searched: {}", request.origin.as_deref().unwrap_or("not specified")),
                    format!(
                        "Destination searched: {}",
                        request.destination.as_deref().unwrap_or("not specified")
                    ),
                ],
                reasoning: "No inventory matched the requested route; suggest different dates or destinations"
                    .to_string(),
                confirmation_number: None,
                flight_number: None,
                seat_assignment: None,
            };
        };

        let confirmation = format!("DA-{}", reference_code(5));
        let code = reference_code(2);
        let row = code.bytes().next().map_or(1, |b| u32::from(b) % 30 + 1);
        let column = SEAT_COLUMNS[code.bytes().last().map_or(0, |b| usize::from(b) % SEAT_COLUMNS.len())];
        let seat = format!("{}{}", row, column);
        let passenger = request
            .passenger_name
            .clone()
            .unwrap_or_else(|| context.customer_name.clone());

        let mut booking_facts = vec![
            format!("Confirmation number: {}", confirmation),
            format!("Passenger: {}", passenger),
            format!(
                "Flight {}: {} to {}",
                flight.flight_number, flight.origin, flight.destination
            ),
            format!("Departure: {}, arrival: {}", flight.departure, flight.arrival),
            format!("Seat: {}", seat),
            format!("Fare: ${:.2} ({})", flight.price, flight.cabin),
        ];
        if let Some(date) = &request.date {
            booking_facts.push(format!("Requested travel date: {}", date));
        }

        BookFlightResponse {
            success: true,
            booking_facts,
            reasoning: format!(
                "Booked {} as the best match for the requested route",
                flight.flight_number
            ),
            confirmation_number: Some(confirmation),
            flight_number: Some(flight.flight_number.clone()),
            seat_assignment: Some(seat),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelFlightRequest {
    pub confirmation_number: Option<String>,
    pub flight_number: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelFlightResponse {
    pub success: bool,
    pub cancellation_facts: Vec<String>,
    pub reasoning: String,
    pub confirmation_number: Option<String>,
    pub refund_amount: Option<f64>,
}

pub struct CancelFlightHandler {
    data: Arc<GroundingData>,
}

impl CancelFlightHandler {
    pub fn new(data: Arc<GroundingData>) -> Self {
        Self { data }
    }

    /// 先按确认号；用户把确认号当航班号报时再按确认号试一次；最后按航段查
    fn find_itinerary(&self, request: &CancelFlightRequest) -> Option<&Itinerary> {
        request
            .confirmation_number
            .as_deref()
            .and_then(|c| self.data.itinerary_by_confirmation(c))
            .or_else(|| {
                request
                    .flight_number
                    .as_deref()
                    .and_then(|f| self.data.itinerary_by_confirmation(f))
            })
            .or_else(|| {
                request
                    .flight_number
                    .as_deref()
                    .and_then(|f| self.data.itinerary_by_flight(f))
            })
    }
}

#[async_trait]
impl Capability for CancelFlightHandler {
    type Request = CancelFlightRequest;
    type Response = CancelFlightResponse;

    fn build_request(&self, classification: &ClassificationResult) -> CancelFlightRequest {
        CancelFlightRequest {
            confirmation_number: entity_value(classification, &["confirmation_number", "booking_id"]),
            flight_number: entity_value(classification, &["flight_number"]),
            reason: entity_value(classification, &["reason"]),
        }
    }

    async fn execute(&self, mut request: CancelFlightRequest, context: &AgentContext) -> CancelFlightResponse {
        if request.confirmation_number.is_none() && request.flight_number.is_none() {
            request.confirmation_number = context.confirmation_number.clone();
            request.flight_number = context.flight_number.clone();
        }

        let Some(itinerary) = self.find_itinerary(&request) else {
            return CancelFlightResponse {
                success: false,
                cancellation_facts: vec![
                    "Booking not found".to_string(),
                    format!(
                        "Searched confirmation: {}",
                        request.confirmation_number.as_deref().unwrap_or("not provided")
                    ),
                    format!(
                        "Searched flight: {}",
                        request.flight_number.as_deref().unwrap_or("not provided")
                    ),
                ],
                reasoning: "Could not locate booking in system - verify confirmation number or flight number"
                    .to_string(),
                confirmation_number: None,
                refund_amount: None,
            };
        };

        let confirmation = itinerary.confirmation_number.clone();
        let mut cancellation_facts = vec![
            format!("Booking cancelled: {}", confirmation),
            format!("Passenger: {}", itinerary.passenger_name),
            format!("Refund amount: ${:.2}", MOCK_REFUND),
            "Refund timeline: 5-7 business days to original payment method".to_string(),
        ];
        if let Some(reason) = &request.reason {
            cancellation_facts.push(format!("Reason noted: {}", reason));
        }

        CancelFlightResponse {
            success: true,
            cancellation_facts,
            reasoning: format!("Successfully cancelled booking {} and initiated refund", confirmation),
            confirmation_number: Some(confirmation),
            refund_amount: Some(MOCK_REFUND),
        }
    }
}
