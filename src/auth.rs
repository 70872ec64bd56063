// Authentification factice : simple accusé de réception, aucune persistance,
// aucun hachage. Le moteur d'analyse n'en dépend pas.

use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthAck {
    pub message: String,
}

pub fn register(username: &str, _password: &str) -> Result<AuthAck, AppError> {
    if username.trim().is_empty() {
        return Err(AppError::Custom("Nom d'utilisateur vide".to_string()));
    }
    Ok(AuthAck {
        message: format!("User {username} registered successfully."),
    })
}

pub fn login(username: &str, _password: &str) -> Result<AuthAck, AppError> {
    if username.trim().is_empty() {
        return Err(AppError::Custom("Nom d'utilisateur vide".to_string()));
    }
    Ok(AuthAck {
        message: format!("User {username} logged in successfully."),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_ack_wording() {
        let ack = register("alice", "secret").unwrap();
        assert_eq!(ack.message, "User alice registered successfully.");
    }

    #[test]
    fn test_login_ack_wording() {
        let ack = login("bob", "secret").unwrap();
        assert_eq!(ack.message, "User bob logged in successfully.");
    }

    #[test]
    fn test_empty_username_rejected() {
        assert!(register("  ", "x").is_err());
        assert!(login("", "x").is_err());
    }
}
