//! UUID utilities

use uuid::Uuid;

/// Generate a new row id in its stored (hyphenated string) form
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_parse_and_differ() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
