//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::registry::ROOM_CODE_LEN;

/// Validates that a room code is six ASCII letters or digits (case-insensitive).
///
/// # Examples
///
/// ```ignore
/// validate_room_code("ABC123") // Ok
/// validate_room_code("abc123") // Ok - normalised later
/// validate_room_code("ABC-12") // Err - punctuation
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    if code.len() != ROOM_CODE_LEN {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be exactly {ROOM_CODE_LEN} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code must contain only letters and digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a display name is not blank once trimmed.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("Player name must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code_valid() {
        assert!(validate_room_code("ABC123").is_ok());
        assert!(validate_room_code("abc123").is_ok());
        assert!(validate_room_code(" ZZZZZZ ").is_ok());
    }

    #[test]
    fn test_validate_room_code_invalid() {
        assert!(validate_room_code("ABC12").is_err()); // too short
        assert!(validate_room_code("ABC1234").is_err()); // too long
        assert!(validate_room_code("ABC-12").is_err()); // punctuation
        assert!(validate_room_code("").is_err());
    }

    #[test]
    fn test_validate_player_name() {
        assert!(validate_player_name("Ada").is_ok());
        assert!(validate_player_name("   ").is_err());
    }
}
