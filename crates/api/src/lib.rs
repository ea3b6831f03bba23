//! HTTP API layer for votebox.
//!
//! - **Endpoints**: auth and polls, JSON in and out
//! - **Extractors**: authenticated user, HTML detection
//! - **Middleware**: session resolution and the access guard
//! - **SSE**: live tally streams
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod sse;

pub use endpoints::router;
pub use sse::{PollStreamEvent, TallyBroadcaster};
