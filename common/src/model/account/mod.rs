//! Account models and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Amount;
#[cfg(feature = "utoipa")]
use crate::utoipa::ToSchema;

/// Account model
///
/// One row per registered login. The balance is mutated only by the
/// Account Settlement Service and never goes negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct Account {
    /// Unique account ID
    pub id: Uuid,
    /// Unique login
    pub login: String,
    /// Cash balance
    pub balance: Amount,
    /// Registration timestamp
    pub registered_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a zero balance
    pub fn new(login: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            login,
            balance: Amount::ZERO,
            registered_at: Utc::now(),
        }
    }
}

/// Registration projection returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(ToSchema))]
pub struct AccountInfo {
    /// Login
    pub login: String,
    /// Registration timestamp
    pub registered_at: DateTime<Utc>,
}

impl From<&Account> for AccountInfo {
    fn from(account: &Account) -> Self {
        Self {
            login: account.login.clone(),
            registered_at: account.registered_at,
        }
    }
}
