//! Gracenote TV listings API client module.
//!
//! Handles HTTP requests to the `tvlistings.gracenote.com` endpoints
//! and resolves the session parameters every grid request needs.

mod api;
mod client;
mod json;
mod outcome;
mod params;
mod session;
mod throttle;
mod types;

#[allow(clippy::module_name_repetitions)]
pub use api::{LocalZapApi, ZapApi};
#[allow(clippy::module_name_repetitions)]
pub use client::{DEFAULT_USER_AGENT, RawResponse, ZapClient, ZapClientBuilder};
pub use outcome::{FetchOutcome, TextPolicy, TransferStats};
pub use params::{AccountParams, GridQuery};
pub use session::{Credentials, Session};
pub use types::{
    CastMember, CrewMember, GenreEntry, GridChannel, GridEvent, GridProgram, GridResponse,
    LoginResponse, OverviewResponse, OverviewTab, RatingField,
};
