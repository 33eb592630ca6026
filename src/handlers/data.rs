//! 模拟业务数据（grounding data）
//!
//! 行程、可订航班与 FAQ 知识库；handler 只从这里取事实，不编造。

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure: String,
    pub arrival: String,
    pub status: String,
    pub gate: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebookOption {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure: String,
    pub arrival: String,
    pub seat: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Voucher {
    pub kind: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Itinerary {
    pub scenario: String,
    pub name: String,
    pub passenger_name: String,
    pub confirmation_number: String,
    pub seat_number: String,
    pub baggage_tag: String,
    pub segments: Vec<Segment>,
    pub rebook_options: Vec<RebookOption>,
    pub vouchers: Vec<Voucher>,
}

impl Itinerary {
    pub fn segment(&self, flight_number: &str) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| s.flight_number.eq_ignore_ascii_case(flight_number))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableFlight {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure: String,
    pub arrival: String,
    pub price: f64,
    pub seats_available: u32,
    pub cabin: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaqEntry {
    pub topic: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct GroundingData {
    pub itineraries: Vec<Itinerary>,
    pub available_flights: Vec<AvailableFlight>,
    pub faq: Vec<FaqEntry>,
}

fn s(v: &str) -> String {
    v.to_string()
}

fn segment(flight: &str, origin: &str, dest: &str, dep: &str, arr: &str, status: &str, gate: &str) -> Segment {
    Segment {
        flight_number: s(flight),
        origin: s(origin),
        destination: s(dest),
        departure: s(dep),
        arrival: s(arr),
        status: s(status),
        gate: s(gate),
    }
}

fn flight(number: &str, origin: &str, dest: &str, dep: &str, arr: &str, price: f64, seats: u32) -> AvailableFlight {
    AvailableFlight {
        flight_number: s(number),
        origin: s(origin),
        destination: s(dest),
        departure: s(dep),
        arrival: s(arr),
        price,
        seats_available: seats,
        cabin: s("Economy"),
    }
}

impl GroundingData {
    /// 演示用数据集：一段受天气影响的中转行程与一段准点行程
    pub fn mock() -> Self {
        let disrupted = Itinerary {
            scenario: s("disrupted"),
            name: s("Paris to New York to Austin"),
            passenger_name: s("Morgan Lee"),
            confirmation_number: s("IR-D204"),
            seat_number: s("14C"),
            baggage_tag: s("BG20488"),
            segments: vec![
                segment(
                    "PA441",
                    "Paris (CDG)",
                    "New York (JFK)",
                    "2024-12-09 14:10",
                    "2024-12-09 17:40",
                    "Delayed 5 hours due to weather, expected departure 19:55",
                    "B18",
                ),
                segment(
                    "NY802",
                    "New York (JFK)",
                    "Austin (AUS)",
                    "2024-12-09 19:10",
                    "2024-12-09 22:35",
                    "Connection missed because of first leg delay",
                    "C7",
                ),
            ],
            rebook_options: vec![
                RebookOption {
                    flight_number: s("NY950"),
                    origin: s("New York (JFK)"),
                    destination: s("Austin (AUS)"),
                    departure: s("2024-12-10 09:45"),
                    arrival: s("2024-12-10 12:30"),
                    seat: s("2A (front row)"),
                    note: s("Partner flight secured with auto-reaccommodation for disrupted travelers"),
                },
                RebookOption {
                    flight_number: s("NY982"),
                    origin: s("New York (JFK)"),
                    destination: s("Austin (AUS)"),
                    departure: s("2024-12-10 13:20"),
                    arrival: s("2024-12-10 16:05"),
                    seat: s("3C"),
                    note: s("Backup option if the morning flight is full"),
                },
            ],
            vouchers: vec![
                Voucher {
                    kind: s("hotel"),
                    description: s("Overnight hotel covered up to $180 near JFK Terminal 5 partner hotel"),
                },
                Voucher {
                    kind: s("meal"),
                    description: s("$60 meal credit for the delay"),
                },
                Voucher {
                    kind: s("ground"),
                    description: s("$40 ground transport credit to the hotel"),
                },
            ],
        };

        let on_time = Itinerary {
            scenario: s("on_time"),
            name: s("On-time commuter flight"),
            passenger_name: s("Taylor Lee"),
            confirmation_number: s("LL0EZ6"),
            seat_number: s("23A"),
            baggage_tag: s("BG55678"),
            segments: vec![segment(
                "FLT-123",
                "San Francisco (SFO)",
                "Los Angeles (LAX)",
                "2024-12-09 16:10",
                "2024-12-09 17:35",
                "On time and operating as scheduled",
                "A10",
            )],
            rebook_options: Vec::new(),
            vouchers: Vec::new(),
        };

        let available_flights = vec![
            flight("DA100", "New York (JFK)", "Los Angeles (LAX)", "2024-12-15 08:00", "2024-12-15 11:30", 299.0, 45),
            flight("DA101", "New York (JFK)", "Los Angeles (LAX)", "2024-12-15 14:00", "2024-12-15 17:30", 349.0, 22),
            flight("DA200", "Los Angeles (LAX)", "Chicago (ORD)", "2024-12-16 09:00", "2024-12-16 14:45", 275.0, 60),
            flight("DA305", "Chicago (ORD)", "Miami (MIA)", "2024-12-17 11:00", "2024-12-17 15:30", 225.0, 35),
        ];

        let faq = [
            ("baggage", "Baggage Policy: You are allowed one carry-on bag and one personal item. Carry-on must be under 22 x 14 x 9 inches. Checked bags: first bag free, second bag $35. Overweight bags (over 50 lbs) incur a $75 fee. If a bag is delayed or missing, file a claim at the airport or with customer service, and we will track it for delivery."),
            ("wifi", "WiFi Policy: We offer complimentary WiFi on all flights. Connect to the 'PacificAir-WiFi' network. Streaming quality is available on flights over 2 hours. For connectivity issues, try disconnecting and reconnecting, or ask a flight attendant for assistance."),
            ("seats", "Seating Information: Our aircraft have 120 seats total. Business class: 22 seats in rows 1-4. Economy Plus: 24 seats in rows 5-8, with extra legroom. Economy: 74 seats in rows 9-25. Exit rows are rows 4 and 16 - passengers must be able to assist in emergencies. Seat selection is free for Business, $15 for preferred Economy seats."),
            ("compensation", "Delay and Compensation Policy: For delays over 2 hours, we provide meal vouchers. For delays over 4 hours or overnight, we provide hotel accommodation and ground transportation. If a delay causes a missed connection, we will rebook you on the next available flight at no charge and open a compensation case. Compensation may include travel credits or frequent flyer miles, depending on the circumstances."),
            ("refunds", "Refund Policy: Full refund available within 24 hours of booking. Refundable tickets can be cancelled anytime for full refund. Non-refundable tickets receive travel credit minus a $75 change fee. Refunds are processed within 7-10 business days. For flight cancellations by the airline, full refund is automatic."),
            ("pets", "Pet Policy: Small dogs and cats are allowed in cabin in an approved carrier. Carrier must fit under the seat (18 x 11 x 11 inches max). Pet fee is $95 each way. Limit of 2 pets per cabin - book early. Service animals fly free with proper documentation. No pets in Business class except service animals."),
        ]
        .into_iter()
        .map(|(topic, content)| FaqEntry {
            topic: s(topic),
            content: s(content),
        })
        .collect();

        Self {
            itineraries: vec![disrupted, on_time],
            available_flights,
            faq,
        }
    }

    pub fn itinerary_by_confirmation(&self, confirmation: &str) -> Option<&Itinerary> {
        self.itineraries
            .iter()
            .find(|i| i.confirmation_number.eq_ignore_ascii_case(confirmation.trim()))
    }

    /// 含该航段的行程
    pub fn itinerary_by_flight(&self, flight_number: &str) -> Option<&Itinerary> {
        if flight_number.trim().is_empty() {
            return None;
        }
        self.itineraries
            .iter()
            .find(|i| i.segment(flight_number.trim()).is_some())
    }

    /// 按出发地/目的地做不区分大小写的部分匹配
    pub fn available_flights(&self, origin: Option<&str>, destination: Option<&str>) -> Vec<&AvailableFlight> {
        let contains = |field: &str, needle: Option<&str>| {
            needle.map_or(true, |n| field.to_uppercase().contains(&n.trim().to_uppercase()))
        };
        self.available_flights
            .iter()
            .filter(|f| contains(&f.origin, origin) && contains(&f.destination, destination))
            .collect()
    }

    pub fn faq_topic(&self, topic: &str) -> Option<&FaqEntry> {
        self.faq.iter().find(|e| e.topic.eq_ignore_ascii_case(topic.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_confirmation_and_flight() {
        let data = GroundingData::mock();
        assert_eq!(data.itinerary_by_confirmation("ir-d204").unwrap().passenger_name, "Morgan Lee");
        assert_eq!(data.itinerary_by_flight("ny802").unwrap().confirmation_number, "IR-D204");
        assert!(data.itinerary_by_flight("").is_none());
        assert!(data.itinerary_by_confirmation("XX0000").is_none());
    }

    #[test]
    fn test_available_flights_partial_match() {
        let data = GroundingData::mock();
        assert_eq!(data.available_flights(Some("jfk"), Some("Los Angeles")).len(), 2);
        assert_eq!(data.available_flights(None, Some("MIA"))[0].flight_number, "DA305");
        assert_eq!(data.available_flights(None, None).len(), 4);
    }
}
