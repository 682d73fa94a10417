//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlTarget`: a unit of work, either a cursor value or an explicit URL
//! - `SessionState`: the step a single crawl session is in

mod session_state;
mod target;

// Re-export main types
pub use session_state::SessionState;
pub use target::CrawlTarget;
