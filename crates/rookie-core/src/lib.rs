// Library root: league data, draft order, prospect pool, and the mock draft
// engine. Integration tests and the app crate consume this public API.

pub mod db;
pub mod draft;
pub mod jobs;
pub mod league;
pub mod maxpf;
pub mod mock;
pub mod pipeline;
pub mod pool;
pub mod protocol;
