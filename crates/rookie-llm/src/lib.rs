// Library root: the OpenAI streaming client used as the mock draft decision
// step.

pub mod client;
