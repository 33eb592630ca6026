//! 意图层：分类数据契约与分类器

pub mod classifier;
pub mod model;

pub use classifier::{format_conversation_context, ClassificationRequest, Classifier, IntentClassifier};
pub use model::{ClassificationResult, Entity, RawClassification, RawEntity};
