use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Owner,
    Courier,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "customer" => Ok(Role::Customer),
            "owner" => Ok(Role::Owner),
            "courier" => Ok(Role::Courier),
            other => Err(format!(
                "unknown role: {other}, expected customer/owner/courier"
            )),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Customer => "customer",
            Role::Owner => "owner",
            Role::Courier => "courier",
        };
        write!(f, "{name}")
    }
}

/// Authenticated identity handed to the core by the session layer.
/// The core trusts it as-is and only checks authorization, never credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}
