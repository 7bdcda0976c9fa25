// Mock draft simulation: per-pick prompts, decision validation, rationale
// cleanup, and article rendering.

pub mod article;
pub mod generator;
pub mod prompt;
pub mod sanitize;
pub mod team;
