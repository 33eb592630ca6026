//! 行李：额度、费用、丢失登记

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::handlers::{entity_value, reference_digits, AgentContext, Capability, GroundingData};
use crate::intent::ClassificationResult;

const CARRY_ON: &str = "One carry-on bag (22x14x9 inches) + one personal item";
const CHECKED_PREMIUM: &str = "First checked bag free for premium members";
const CHECKED_ECONOMY: &str = "$35 for first checked bag, $45 for second";
const WEIGHT_LIMIT: &str = "50 lbs per checked bag";

const FEE_OVERWEIGHT: &str = "$75 for bags over 50 lbs";
const FEE_OVERSIZED: &str = "$100 for bags over 62 linear inches";
const FEE_EXTRA_BAG: &str = "$45 for third+ bags";
const FEE_SPORTS: &str = "$35 per item";

const LOST_CLAIM_WINDOW: &str = "File within 24 hours of arrival";
const LOST_DELIVERY: &str = "Delivery within 5 business days";
const LOST_INTERIM: &str = "Up to $50/day for essential items while bag is located";

const TRACKING_BASE_URL: &str = "https://deterministic.airlines/baggage/track";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BaggageCategory {
    Lost,
    Fees,
    Allowance,
    Policy,
}

impl BaggageCategory {
    /// 关键词优先级：丢失 > 费用 > 额度 > 一般政策
    pub fn detect(question: &str) -> Self {
        let q = question.to_lowercase();
        let any = |words: &[&str]| words.iter().any(|w| q.contains(w));
        if any(&["lost", "missing", "can't find", "didn't arrive"]) {
            BaggageCategory::Lost
        } else if any(&["fee", "cost", "charge", "price", "how much"]) {
            BaggageCategory::Fees
        } else if any(&["allowance", "include", "how many", "limit", "weight"]) {
            BaggageCategory::Allowance
        } else {
            BaggageCategory::Policy
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BaggageRequest {
    pub question: String,
    pub confirmation_number: Option<String>,
    pub baggage_tag: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BaggageResponse {
    pub policy_facts: Vec<String>,
    pub category: BaggageCategory,
    pub reasoning: String,
    pub claim_number: Option<String>,
    pub tracking_url: Option<String>,
}

pub struct BaggageHandler {
    data: Arc<GroundingData>,
}

impl BaggageHandler {
    pub fn new(data: Arc<GroundingData>) -> Self {
        Self { data }
    }

    fn lost_bag(&self, request: &BaggageRequest, context: &AgentContext) -> BaggageResponse {
        let claim_number = format!("BG-{}", reference_digits(6));
        let tracking_url = format!("{}/{}", TRACKING_BASE_URL, claim_number);
        let mut policy_facts = vec![
            format!("Claim number: {}", claim_number),
            format!("Claim window: {}", LOST_CLAIM_WINDOW),
            format!("Delivery promise: {}", LOST_DELIVERY),
            format!("Interim expenses: {}", LOST_INTERIM),
            format!("Tracking URL: {}", tracking_url),
        ];

        let itinerary = request
            .confirmation_number
            .as_deref()
            .or(context.confirmation_number.as_deref())
            .and_then(|c| self.data.itinerary_by_confirmation(c));
        let tag = request
            .baggage_tag
            .clone()
            .or_else(|| itinerary.map(|i| i.baggage_tag.clone()));
        if let Some(tag) = tag {
            policy_facts.push(format!("Bag tag on file: {}", tag));
        }
        if let Some(itinerary) = itinerary {
            if let Some(last) = itinerary.segments.last() {
                policy_facts.push(format!("Delivery destination: {}", last.destination));
            }
        }

        BaggageResponse {
            policy_facts,
            category: BaggageCategory::Lost,
            reasoning: "User reported lost/missing bag - filed claim and provided tracking info".to_string(),
            claim_number: Some(claim_number),
            tracking_url: Some(tracking_url),
        }
    }
}

#[async_trait]
impl Capability for BaggageHandler {
    type Request = BaggageRequest;
    type Response = BaggageResponse;

    fn build_request(&self, classification: &ClassificationResult) -> BaggageRequest {
        BaggageRequest {
            question: classification.rewritten_prompt().to_string(),
            confirmation_number: entity_value(classification, &["confirmation_number", "booking_id"]),
            baggage_tag: entity_value(classification, &["baggage_tag", "bag_tag"]),
        }
    }

    async fn execute(&self, request: BaggageRequest, context: &AgentContext) -> BaggageResponse {
        let category = BaggageCategory::detect(&request.question);
        tracing::debug!(?category, "baggage inquiry");
        match category {
            BaggageCategory::Lost => self.lost_bag(&request, context),
            BaggageCategory::Fees => BaggageResponse {
                policy_facts: vec![
                    format!("Overweight bags (>50 lbs): {}", FEE_OVERWEIGHT),
                    format!("Oversized bags (>62 linear inches): {}", FEE_OVERSIZED),
                    format!("Extra bags (3rd+): {}", FEE_EXTRA_BAG),
                    format!("Sports equipment: {}", FEE_SPORTS),
                ],
                category,
                reasoning: "User asked about baggage fees - returning fee schedule from policy".to_string(),
                claim_number: None,
                tracking_url: None,
            },
            BaggageCategory::Allowance => BaggageResponse {
                policy_facts: vec![
                    format!("Carry-on: {}", CARRY_ON),
                    format!("Premium checked: {}", CHECKED_PREMIUM),
                    format!("Economy checked: {}", CHECKED_ECONOMY),
                    format!("Weight limit: {}", WEIGHT_LIMIT),
                ],
                category,
                reasoning: "User asked about baggage allowance - returning allowance limits from policy".to_string(),
                claim_number: None,
                tracking_url: None,
            },
            BaggageCategory::Policy => BaggageResponse {
                policy_facts: vec![
                    format!("Carry-on allowance: {}", CARRY_ON),
                    format!("First checked bag (economy): {}", CHECKED_ECONOMY),
                    format!("Weight limit: {}", WEIGHT_LIMIT),
                    "For lost bags, describe what happened and we'll file a claim".to_string(),
                ],
                category,
                reasoning: "General baggage policy inquiry - providing overview of key policies".to_string(),
                claim_number: None,
                tracking_url: None,
            },
        }
    }
}
