pub mod eligibility;
pub mod runner;

pub use eligibility::{evaluate, explain, Decision, EligibilityPolicy, StandardPolicy, VerificationDecision};
pub use runner::{PassSummary, ProviderFailure, VerificationRunner};
