//! Session bootstrap: credentials and account parameter resolution.

use std::fmt;

use anyhow::{Context, Result, bail};

use super::api::LocalZapApi;
use super::params::AccountParams;

/// Country assumed for anonymous lineup access.
const ANONYMOUS_COUNTRY: &str = "USA";

/// Device code used when the lineup does not name one.
const UNKNOWN_DEVICE: &str = "-";

/// How the session identifies itself to the listings site.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Email/password login.
    Account {
        /// Account email.
        username: String,
        /// Account password.
        password: String,
    },
    /// Anonymous access by lineup ID (`headend` or `headend:device`).
    Lineup {
        /// Lineup ID.
        lineup_id: String,
        /// Postal/zip code.
        postal_code: Option<String>,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account { username, .. } => f
                .debug_struct("Account")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Lineup {
                lineup_id,
                postal_code,
            } => f
                .debug_struct("Lineup")
                .field("lineup_id", lineup_id)
                .field("postal_code", postal_code)
                .finish(),
        }
    }
}

impl Credentials {
    /// Picks the access mode from the configured options.
    ///
    /// A lineup ID selects anonymous access and wins over any username
    /// and password.
    ///
    /// # Errors
    ///
    /// Returns an error when neither a lineup ID nor both username and
    /// password are given.
    pub fn resolve(
        username: Option<&str>,
        password: Option<&str>,
        lineup_id: Option<&str>,
        postal_code: Option<&str>,
    ) -> Result<Self> {
        let non_empty = |value: Option<&str>| value.filter(|v| !v.is_empty()).map(String::from);

        if let Some(lineup_id) = non_empty(lineup_id) {
            return Ok(Self::Lineup {
                lineup_id,
                postal_code: non_empty(postal_code),
            });
        }

        match (non_empty(username), non_empty(password)) {
            (Some(username), Some(password)) => Ok(Self::Account { username, password }),
            _ => bail!("Unable to login: unspecified username or password"),
        }
    }
}

/// Splits `headend[:device]` into its parts.
fn split_lineup(lineup: &str) -> (String, String) {
    match lineup.split_once(':') {
        Some((headend, device)) => (String::from(headend), String::from(device)),
        None => (String::from(lineup), String::from(UNKNOWN_DEVICE)),
    }
}

/// Lazily established listings session.
///
/// The login round-trip happens on the first call to [`Session::params`],
/// so a fully cached run never touches the network.
#[derive(Debug)]
pub struct Session {
    credentials: Credentials,
    account: Option<AccountParams>,
}

impl Session {
    /// Creates an unestablished session.
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            account: None,
        }
    }

    /// Returns the account parameters, logging in on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the login request fails or its response
    /// carries no token.
    pub async fn params(&mut self, api: &(impl LocalZapApi + Sync)) -> Result<AccountParams> {
        if let Some(ref account) = self.account {
            return Ok(account.clone());
        }

        let account = match self.credentials {
            Credentials::Lineup {
                ref lineup_id,
                ref postal_code,
            } => {
                let (headend, device) = split_lineup(lineup_id);
                tracing::info!(%headend, %device, "Using anonymous lineup access");
                AccountParams {
                    token: None,
                    pref: String::from("-"),
                    postal_code: postal_code.clone(),
                    country: Some(String::from(ANONYMOUS_COUNTRY)),
                    headend_id: Some(headend),
                    device,
                }
            }
            Credentials::Account {
                ref username,
                ref password,
            } => {
                tracing::info!(%username, "Logging in");
                let login = api
                    .login(username, password)
                    .await
                    .context("Unable to login")?;
                let Some(token) = login.token.clone().filter(|t| !t.is_empty()) else {
                    bail!("Unable to login: response carried no token");
                };
                let (headend, device) = login
                    .property("2004")
                    .as_deref()
                    .map_or((None, String::from(UNKNOWN_DEVICE)), |lineup| {
                        let (headend, device) = split_lineup(lineup);
                        (Some(headend), device)
                    });
                AccountParams {
                    token: Some(token),
                    pref: login.preference(),
                    postal_code: login.property("2002"),
                    country: login.property("2003"),
                    headend_id: headend,
                    device,
                }
            }
        };

        tracing::debug!(lineup_id = %account.lineup_id(), pref = %account.pref, "Session established");
        self.account = Some(account.clone());
        Ok(account)
    }
}
