//! Grid request parameter types.

/// Affiliate ID the listings site expects on every grid request.
const AFFILIATE_ID: &str = "orbebb";

/// Account/lineup parameters resolved by the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountParams {
    /// Session token (credentialed mode only).
    pub token: Option<String>,
    /// Feature preference string (`"m,p,h"` subset or `"-"`).
    pub pref: String,
    /// Postal/zip code.
    pub postal_code: Option<String>,
    /// Country code (e.g. `USA`).
    pub country: Option<String>,
    /// Headend (lineup) ID.
    pub headend_id: Option<String>,
    /// Device code (`"-"` when unknown).
    pub device: String,
}

impl AccountParams {
    /// Formats the composite lineup ID: `{country}-{headend}-DEFAULT`.
    ///
    /// Empty when either part is unknown.
    #[must_use]
    pub fn lineup_id(&self) -> String {
        match (self.country.as_deref(), self.headend_id.as_deref()) {
            (Some(country), Some(headend)) => format!("{country}-{headend}-DEFAULT"),
            _ => String::new(),
        }
    }
}

/// Request parameters for one `api/grid` window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridQuery {
    /// Window start as epoch milliseconds.
    pub start_ms: i64,
    /// Window span in hours.
    pub timespan_hours: u32,
    /// Account/lineup parameters.
    pub account: AccountParams,
}

impl GridQuery {
    /// Creates a new `GridQuery`.
    #[must_use]
    pub const fn new(start_ms: i64, timespan_hours: u32, account: AccountParams) -> Self {
        Self {
            start_ms,
            timespan_hours,
            account,
        }
    }

    /// Builds the query string pairs in the order the site sends them.
    ///
    /// `time` is in epoch seconds; the fixed tracking parameters are
    /// required by the remote API even though they carry no data.
    #[must_use]
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let account = &self.account;
        let mut query: Vec<(&str, String)> = vec![
            ("time", self.start_ms.div_euclid(1000).to_string()),
            ("timespan", self.timespan_hours.to_string()),
            ("pref", account.pref.clone()),
        ];

        if let Some(ref token) = account.token {
            query.push(("token", token.clone()));
        }

        query.push(("lineupId", account.lineup_id()));
        query.push((
            "postalCode",
            account.postal_code.clone().unwrap_or_default(),
        ));
        query.push(("country", account.country.clone().unwrap_or_default()));
        query.push(("headendId", account.headend_id.clone().unwrap_or_default()));
        query.push(("device", account.device.clone()));
        query.push(("aid", String::from(AFFILIATE_ID)));

        query.push(("TMSID", String::new()));
        query.push(("AffiliateID", String::from(AFFILIATE_ID)));
        query.push(("FromPage", String::from("TV Grid")));
        query.push(("ActivityID", String::from("1")));
        query.push(("OVDID", String::new()));
        query.push(("isOverride", String::from("true")));

        query
    }
}
