//! 航班状态：按航班号或确认号查航段，附带中转影响与改签选项

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::handlers::{entity_value, AgentContext, Capability, GroundingData, Itinerary, Segment};
use crate::intent::ClassificationResult;

#[derive(Debug, Clone, Default)]
pub struct FlightStatusRequest {
    pub flight_number: Option<String>,
    pub confirmation_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlightStatusResponse {
    pub found: bool,
    pub status_facts: Vec<String>,
    pub reasoning: String,
    pub flight_number: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub status: Option<String>,
    pub departure_time: Option<String>,
    pub arrival_time: Option<String>,
    pub gate: Option<String>,
}

pub struct FlightStatusHandler {
    data: Arc<GroundingData>,
}

impl FlightStatusHandler {
    pub fn new(data: Arc<GroundingData>) -> Self {
        Self { data }
    }

    /// 航班号优先；仅有确认号时取行程中第一个非准点航段
    fn locate<'a>(&'a self, request: &FlightStatusRequest) -> Option<(&'a Itinerary, &'a Segment)> {
        if let Some(flight) = request.flight_number.as_deref() {
            if let Some(itinerary) = self.data.itinerary_by_flight(flight) {
                return itinerary.segment(flight).map(|s| (itinerary, s));
            }
        }
        let itinerary = request
            .confirmation_number
            .as_deref()
            .and_then(|c| self.data.itinerary_by_confirmation(c))?;
        let segment = itinerary
            .segments
            .iter()
            .find(|s| !s.status.starts_with("On time"))
            .or_else(|| itinerary.segments.first())?;
        Some((itinerary, segment))
    }
}

fn segment_fact(segment: &Segment) -> String {
    format!(
        "{} {} to {}: {} (departs {}, arrives {}, gate {})",
        segment.flight_number,
        segment.origin,
        segment.destination,
        segment.status,
        segment.departure,
        segment.arrival,
        segment.gate
    )
}

#[async_trait]
impl Capability for FlightStatusHandler {
    type Request = FlightStatusRequest;
    type Response = FlightStatusResponse;

    fn build_request(&self, classification: &ClassificationResult) -> FlightStatusRequest {
        FlightStatusRequest {
            flight_number: entity_value(classification, &["flight_number"]),
            confirmation_number: entity_value(classification, &["confirmation_number", "booking_id"]),
        }
    }

    async fn execute(&self, mut request: FlightStatusRequest, context: &AgentContext) -> FlightStatusResponse {
        if request.flight_number.is_none() && request.confirmation_number.is_none() {
            request.flight_number = context.flight_number.clone();
            request.confirmation_number = context.confirmation_number.clone();
        }

        if let Some((itinerary, segment)) = self.locate(&request) {
            let mut status_facts = vec![
                format!("Passenger: {} ({})", itinerary.passenger_name, itinerary.confirmation_number),
                segment_fact(segment),
            ];
            for other in itinerary.segments.iter().filter(|s| s.flight_number != segment.flight_number) {
                status_facts.push(format!("Connection impact: {}", segment_fact(other)));
            }
            for option in &itinerary.rebook_options {
                status_facts.push(format!(
                    "Rebooking option: {} {} to {} departing {} (seat {}) - {}",
                    option.flight_number,
                    option.origin,
                    option.destination,
                    option.departure,
                    option.seat,
                    option.note
                ));
            }
            return FlightStatusResponse {
                found: true,
                status_facts,
                reasoning: format!("Found {} on itinerary {}", segment.flight_number, itinerary.confirmation_number),
                flight_number: Some(segment.flight_number.clone()),
                origin: Some(segment.origin.clone()),
                destination: Some(segment.destination.clone()),
                status: Some(segment.status.clone()),
                departure_time: Some(segment.departure.clone()),
                arrival_time: Some(segment.arrival.clone()),
                gate: Some(segment.gate.clone()),
            };
        }

        // 未出票的可订航班只有时刻表信息
        if let Some(flight) = request.flight_number.as_deref().and_then(|f| {
            self.data
                .available_flights
                .iter()
                .find(|a| a.flight_number.eq_ignore_ascii_case(f))
        }) {
            return FlightStatusResponse {
                found: true,
                status_facts: vec![format!(
                    "{} {} to {}: Scheduled (departs {}, arrives {})",
                    flight.flight_number, flight.origin, flight.destination, flight.departure, flight.arrival
                )],
                reasoning: format!("{} is in the published schedule", flight.flight_number),
                flight_number: Some(flight.flight_number.clone()),
                origin: Some(flight.origin.clone()),
                destination: Some(flight.destination.clone()),
                status: Some("Scheduled".to_string()),
                departure_time: Some(flight.departure.clone()),
                arrival_time: Some(flight.arrival.clone()),
                gate: None,
            };
        }

        FlightStatusResponse {
            found: false,
            status_facts: vec![
                "Flight not found".to_string(),
                format!(
                    "Searched flight: {}",
                    request.flight_number.as_deref().unwrap_or("not provided")
                ),
                format!(
                    "Searched confirmation: {}",
                    request.confirmation_number.as_deref().unwrap_or("not provided")
                ),
            ],
            reasoning: "No flight matched - ask for a flight number or confirmation number".to_string(),
            flight_number: None,
            origin: None,
            destination: None,
            status: None,
            departure_time: None,
            arrival_time: None,
            gate: None,
        }
    }
}
