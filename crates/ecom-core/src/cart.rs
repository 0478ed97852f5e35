use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Cart lifecycle. Only `active` carts accept new items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
    Active,
    Merged,
    Ordered,
    Abandoned,
}

impl CartStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CartStatus::Active => "active",
            CartStatus::Merged => "merged",
            CartStatus::Ordered => "ordered",
            CartStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for CartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CartStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(CartStatus::Active),
            "merged" => Ok(CartStatus::Merged),
            "ordered" => Ok(CartStatus::Ordered),
            "abandoned" => Ok(CartStatus::Abandoned),
            _ => Err(CoreError::InvalidCartStatus(s.to_string())),
        }
    }
}

/// Who a cart belongs to: a registered user or an anonymous browser session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(Uuid),
    Guest(String),
}

impl CartOwner {
    /// Exactly one of `user_id` / `session_id` must be supplied.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCartOwner`] when both or neither are present,
    /// or the session id is blank or longer than 128 characters.
    pub fn from_parts(user_id: Option<Uuid>, session_id: Option<&str>) -> Result<Self, CoreError> {
        let session_id = session_id.map(str::trim).filter(|s| !s.is_empty());
        match (user_id, session_id) {
            (Some(user_id), None) => Ok(CartOwner::User(user_id)),
            (None, Some(session)) if session.len() <= 128 => {
                Ok(CartOwner::Guest(session.to_owned()))
            }
            (None, Some(_)) => Err(CoreError::InvalidCartOwner(
                "sessionId must be at most 128 characters".to_string(),
            )),
            (Some(_), Some(_)) => Err(CoreError::InvalidCartOwner(
                "provide either userId or sessionId, not both".to_string(),
            )),
            (None, None) => Err(CoreError::InvalidCartOwner(
                "userId or sessionId is required".to_string(),
            )),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            CartOwner::User(id) => Some(*id),
            CartOwner::Guest(_) => None,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            CartOwner::User(_) => None,
            CartOwner::Guest(session) => Some(session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_owner() {
        let id = Uuid::new_v4();
        let owner = CartOwner::from_parts(Some(id), None).unwrap();
        assert_eq!(owner.user_id(), Some(id));
        assert!(owner.session_id().is_none());
    }

    #[test]
    fn guest_owner_is_trimmed() {
        let owner = CartOwner::from_parts(None, Some("  session_123_abc ")).unwrap();
        assert_eq!(owner.session_id(), Some("session_123_abc"));
    }

    #[test]
    fn rejects_both_and_neither() {
        assert!(CartOwner::from_parts(Some(Uuid::new_v4()), Some("s")).is_err());
        assert!(CartOwner::from_parts(None, None).is_err());
        assert!(CartOwner::from_parts(None, Some("   ")).is_err());
    }

    #[test]
    fn cart_status_parses_known_values() {
        assert_eq!("Ordered".parse::<CartStatus>().unwrap(), CartStatus::Ordered);
        assert_eq!(CartStatus::Abandoned.to_string(), "abandoned");
        assert!(matches!(
            "paid".parse::<CartStatus>(),
            Err(CoreError::InvalidCartStatus(_))
        ));
    }

    #[test]
    fn rejects_oversized_session() {
        let long = "x".repeat(129);
        assert!(CartOwner::from_parts(None, Some(&long)).is_err());
    }
}
