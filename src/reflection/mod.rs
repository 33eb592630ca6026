//! 反思层：步骤满足度评估与有界多步执行循环

pub mod evaluator;
pub mod model;
pub mod runner;

pub use evaluator::{format_steps, ExecutedStep, ReflectionEvaluator, Reflector};
pub use model::{RawReflection, ReflectionResult};
pub use runner::{ReflectionLoop, StepResult, MAX_STEPS};
