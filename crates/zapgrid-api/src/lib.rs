//! API client library for zapgrid.
//!
//! Provides the client for the Gracenote TV listings web API
//! (login, time-windowed grid, per-series overview details).

/// Gracenote TV listings API client.
pub mod gracenote;
