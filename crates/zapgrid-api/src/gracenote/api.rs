//! `ZapApi` trait definition.
#![allow(clippy::future_not_send)]

use anyhow::Result;

use super::outcome::{FetchOutcome, TransferStats};
use super::params::GridQuery;
use super::types::LoginResponse;

/// Gracenote listings API trait.
///
/// Abstracts API operations for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(ZapApi: Send)]
pub trait LocalZapApi {
    /// Exchanges credentials for a session token and account properties.
    ///
    /// # Errors
    ///
    /// Returns an error if every attempt fails or the response cannot be decoded.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse>;

    /// Fetches the raw JSON body for one grid window.
    ///
    /// `Failed` means "no more data".
    ///
    /// # Errors
    ///
    /// Returns an error if the request URL cannot be built.
    async fn grid(&self, query: &GridQuery) -> Result<FetchOutcome<String>>;

    /// Fetches the raw JSON overview details for a series.
    ///
    /// `Failed` means "unavailable".
    ///
    /// # Errors
    ///
    /// Returns an error if the request URL cannot be built.
    async fn overview(&self, series_id: &str) -> Result<FetchOutcome<String>>;

    /// Transfer counters accumulated so far.
    fn transfer_stats(&self) -> TransferStats;
}
