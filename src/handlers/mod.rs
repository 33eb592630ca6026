//! 能力 handler：注册表、共享上下文、模拟业务数据与七个航空客服能力
//!
//! 每个 handler 只产出结构化事实；自然语言回复由 compose 层统一生成。

pub mod baggage;
pub mod booking;
pub mod compensation;
pub mod context;
pub mod data;
pub mod faq;
pub mod flight_status;
pub mod registry;
pub mod response;
pub mod seat;

pub use context::AgentContext;
pub use data::{AvailableFlight, FaqEntry, GroundingData, Itinerary, RebookOption, Segment, Voucher};
pub use registry::{Capability, Handler, HandlerDeps, HandlerFactory, HandlerRegistry};
pub use response::HandlerResponse;

use crate::core::AgentError;
use crate::intent::ClassificationResult;

use baggage::BaggageHandler;
use booking::{BookFlightHandler, CancelFlightHandler};
use compensation::CompensationHandler;
use faq::FaqHandler;
use flight_status::FlightStatusHandler;
use seat::SeatHandler;

/// 按候选类型依次查找实体，取第一个命中的值
pub(crate) fn entity_value(classification: &ClassificationResult, types: &[&str]) -> Option<String> {
    types
        .iter()
        .find_map(|t| classification.entity(t))
        .map(str::to_string)
}

/// len 位十进制参考号（不足补零）
pub(crate) fn reference_digits(len: usize) -> String {
    let n = uuid::Uuid::new_v4().as_u128();
    let digits = format!("{:039}", n);
    digits[digits.len() - len.min(digits.len())..].to_string()
}

/// len 位大写字母数字参考号
pub(crate) fn reference_code(len: usize) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut n = uuid::Uuid::new_v4().as_u128();
    (0..len)
        .map(|_| {
            let c = ALPHABET[(n % ALPHABET.len() as u128) as usize] as char;
            n /= ALPHABET.len() as u128;
            c
        })
        .collect()
}

/// 注册内置的七个能力
pub fn register_default_handlers(registry: &mut HandlerRegistry) -> Result<(), AgentError> {
    registry.register(
        "faq",
        "Answers general questions about baggage, policies, fees, and airline procedures",
        |deps: &HandlerDeps| -> Box<dyn Handler> { Box::new(FaqHandler::new(deps.data.clone())) },
    )?;
    registry.register(
        "book_flight",
        "Books a new flight reservation for the customer",
        |deps: &HandlerDeps| -> Box<dyn Handler> { Box::new(BookFlightHandler::new(deps.data.clone())) },
    )?;
    registry.register(
        "cancel_flight",
        "Cancels an existing flight booking and processes refunds",
        |deps: &HandlerDeps| -> Box<dyn Handler> { Box::new(CancelFlightHandler::new(deps.data.clone())) },
    )?;
    registry.register(
        "flight_status",
        "Checks flight status including delays, cancellations, gate info, and connection impacts",
        |deps: &HandlerDeps| -> Box<dyn Handler> { Box::new(FlightStatusHandler::new(deps.data.clone())) },
    )?;
    registry.register(
        "baggage",
        "Handles baggage inquiries including allowance, fees, and lost bag claims",
        |deps: &HandlerDeps| -> Box<dyn Handler> { Box::new(BaggageHandler::new(deps.data.clone())) },
    )?;
    registry.register(
        "seat",
        "Handles seat selection, changes, and special service seating requests",
        |deps: &HandlerDeps| -> Box<dyn Handler> { Box::new(SeatHandler::new(deps.data.clone())) },
    )?;
    registry.register(
        "compensation",
        "Processes compensation requests including vouchers, hotel credits, meal credits, and refunds for delays, cancellations, and missed connections",
        |deps: &HandlerDeps| -> Box<dyn Handler> { Box::new(CompensationHandler::new(deps.data.clone())) },
    )?;
    Ok(())
}
