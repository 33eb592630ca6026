//! 补偿：按中断程度发放代金券并开案

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::handlers::{entity_value, reference_digits, AgentContext, Capability, GroundingData, Itinerary};
use crate::intent::ClassificationResult;

/// 出现在该确认号上的行程视为错过中转
const DISRUPTED_CONFIRMATION: &str = "IR-D204";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisruptionLevel {
    Minor,
    Significant,
    Severe,
}

impl DisruptionLevel {
    /// 没有行程可查时按描述文本判断
    pub fn from_reason(text: &str) -> Self {
        let t = text.to_lowercase();
        if ["missed", "cancelled", "cancel"].iter().any(|w| t.contains(w)) {
            DisruptionLevel::Severe
        } else if ["delay", "late", "hour"].iter().any(|w| t.contains(w)) {
            DisruptionLevel::Significant
        } else {
            DisruptionLevel::Minor
        }
    }

    fn default_vouchers(self) -> Vec<String> {
        match self {
            DisruptionLevel::Severe => vec![
                "$180 hotel voucher (partner hotel near terminal)".to_string(),
                "$60 meal credit".to_string(),
                "$40 ground transport credit".to_string(),
            ],
            DisruptionLevel::Significant => vec!["$60 meal credit".to_string()],
            DisruptionLevel::Minor => vec!["Documented for customer service follow-up".to_string()],
        }
    }

    fn next_steps(self) -> &'static str {
        match self {
            DisruptionLevel::Severe => "1. Check in to partner hotel using your voucher. 2. Use meal credit at airport restaurants. 3. Your rebooking is confirmed for tomorrow morning. 4. Save receipts for any additional expenses.",
            DisruptionLevel::Significant => "Use your meal credit at any airport restaurant. Show this case number.",
            DisruptionLevel::Minor => "No immediate action needed. We'll be in touch.",
        }
    }
}

/// 取描述中第一个 "$" 后的金额
fn voucher_amount(voucher: &str) -> Option<f64> {
    let (_, rest) = voucher.split_once('$')?;
    let digits: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits.parse().ok()
}

#[derive(Debug, Clone, Default)]
pub struct CompensationRequest {
    pub confirmation_number: Option<String>,
    pub flight_number: Option<String>,
    pub reason: Option<String>,
    pub question: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompensationResponse {
    pub case_opened: bool,
    pub case_id: Option<String>,
    pub disruption_level: DisruptionLevel,
    pub vouchers: Vec<String>,
    pub total_value: Option<f64>,
    pub compensation_facts: Vec<String>,
    pub reasoning: String,
    pub next_steps: Option<String>,
}

pub struct CompensationHandler {
    data: Arc<GroundingData>,
}

impl CompensationHandler {
    pub fn new(data: Arc<GroundingData>) -> Self {
        Self { data }
    }

    fn find_itinerary(&self, request: &CompensationRequest, context: &AgentContext) -> Option<&Itinerary> {
        if let Some(c) = request.confirmation_number.as_deref() {
            return self.data.itinerary_by_confirmation(c);
        }
        if let Some(f) = request.flight_number.as_deref() {
            return self.data.itinerary_by_flight(f);
        }
        context
            .confirmation_number
            .as_deref()
            .and_then(|c| self.data.itinerary_by_confirmation(c))
    }
}

#[async_trait]
impl Capability for CompensationHandler {
    type Request = CompensationRequest;
    type Response = CompensationResponse;

    fn build_request(&self, classification: &ClassificationResult) -> CompensationRequest {
        CompensationRequest {
            confirmation_number: entity_value(classification, &["confirmation_number", "booking_id"]),
            flight_number: entity_value(classification, &["flight_number"]),
            reason: entity_value(classification, &["reason", "disruption"]),
            question: classification.rewritten_prompt().to_string(),
        }
    }

    async fn execute(&self, request: CompensationRequest, context: &AgentContext) -> CompensationResponse {
        let itinerary = self.find_itinerary(&request, context);

        let level = match itinerary {
            Some(i) if i.confirmation_number == DISRUPTED_CONFIRMATION => DisruptionLevel::Severe,
            Some(_) => DisruptionLevel::Minor,
            None => DisruptionLevel::from_reason(request.reason.as_deref().unwrap_or(&request.question)),
        };

        // 行程自带的代金券优先
        let vouchers: Vec<String> = match itinerary {
            Some(i) if !i.vouchers.is_empty() => i.vouchers.iter().map(|v| v.description.clone()).collect(),
            _ => level.default_vouchers(),
        };
        let total: f64 = vouchers.iter().filter_map(|v| voucher_amount(v)).sum();
        let case_id = format!("CMP-{}", reference_digits(4));

        let mut compensation_facts = vec![format!("Case opened: {}", case_id)];
        if let Some(i) = itinerary {
            compensation_facts.push(format!("Passenger: {} ({})", i.passenger_name, i.confirmation_number));
        }
        compensation_facts.extend(vouchers.iter().map(|v| format!("Voucher: {}", v)));
        if total > 0.0 {
            compensation_facts.push(format!("Total compensation value: ${:.2}", total));
        }
        if level == DisruptionLevel::Severe {
            compensation_facts.push(
                "Keep all receipts and attach them to the case for reimbursement of additional expenses"
                    .to_string(),
            );
        }
        if level == DisruptionLevel::Minor {
            compensation_facts.push("A customer service representative will follow up within 24 hours".to_string());
        }

        let reasoning = match level {
            DisruptionLevel::Severe => "Missed connection qualifies for overnight accommodation, meals and ground transport",
            DisruptionLevel::Significant => "Delay qualifies for a meal credit",
            DisruptionLevel::Minor => "No qualifying disruption found - concern documented for follow-up",
        };

        CompensationResponse {
            case_opened: true,
            case_id: Some(case_id),
            disruption_level: level,
            vouchers,
            total_value: (total > 0.0).then_some(total),
            compensation_facts,
            reasoning: reasoning.to_string(),
            next_steps: Some(level.next_steps().to_string()),
        }
    }
}
