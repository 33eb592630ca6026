//! 各 handler 结构化响应的统一包装

use serde::Serialize;

use crate::handlers::baggage::BaggageResponse;
use crate::handlers::booking::{BookFlightResponse, CancelFlightResponse};
use crate::handlers::compensation::CompensationResponse;
use crate::handlers::faq::FaqResponse;
use crate::handlers::flight_status::FlightStatusResponse;
use crate::handlers::seat::SeatResponse;

/// 序列化时只输出内部结构（供回复生成器作为 tool data）
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum HandlerResponse {
    Faq(FaqResponse),
    BookFlight(BookFlightResponse),
    CancelFlight(CancelFlightResponse),
    FlightStatus(FlightStatusResponse),
    Baggage(BaggageResponse),
    Seat(SeatResponse),
    Compensation(CompensationResponse),
}

impl HandlerResponse {
    /// 结构化响应的类型名
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerResponse::Faq(_) => "FaqResponse",
            HandlerResponse::BookFlight(_) => "BookFlightResponse",
            HandlerResponse::CancelFlight(_) => "CancelFlightResponse",
            HandlerResponse::FlightStatus(_) => "FlightStatusResponse",
            HandlerResponse::Baggage(_) => "BaggageResponse",
            HandlerResponse::Seat(_) => "SeatResponse",
            HandlerResponse::Compensation(_) => "CompensationResponse",
        }
    }

    /// 空白时为 None
    pub fn reasoning(&self) -> Option<&str> {
        let reasoning = match self {
            HandlerResponse::Faq(r) => &r.reasoning,
            HandlerResponse::BookFlight(r) => &r.reasoning,
            HandlerResponse::CancelFlight(r) => &r.reasoning,
            HandlerResponse::FlightStatus(r) => &r.reasoning,
            HandlerResponse::Baggage(r) => &r.reasoning,
            HandlerResponse::Seat(r) => &r.reasoning,
            HandlerResponse::Compensation(r) => &r.reasoning,
        };
        Some(reasoning.as_str()).filter(|r| !r.trim().is_empty())
    }

    /// 反思日志中的步骤摘要：reasoning，缺失时用类型名
    pub fn step_summary(&self) -> &str {
        self.reasoning().unwrap_or_else(|| self.kind())
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

macro_rules! impl_from_response {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for HandlerResponse {
                fn from(r: $ty) -> Self {
                    HandlerResponse::$variant(r)
                }
            }
        )*
    };
}

impl_from_response! {
    Faq => FaqResponse,
    BookFlight => BookFlightResponse,
    CancelFlight => CancelFlightResponse,
    FlightStatus => FlightStatusResponse,
    Baggage => BaggageResponse,
    Seat => SeatResponse,
    Compensation => CompensationResponse,
}
