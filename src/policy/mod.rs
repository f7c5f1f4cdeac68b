//! Policy rules and the image policy linter.

mod builtin;
mod image;
mod linter;
#[expect(clippy::module_inception, reason = "The policy type lives in its own file")]
mod policy;
mod rule;

pub use builtin::{builtin_policy, builtin_rules};
pub use image::{
    ImageMetadata, ImageReference, LABEL_MODEL_NAME, LABEL_MODEL_VERSION, LABEL_NIM_VERSION, LABEL_QUANTIZATION,
};
pub use linter::{EvaluationFailure, LintResult, LintViolation, PolicyLinter};
pub use policy::Policy;
pub use rule::{Rule, RuleSeverity};
