// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for status conditions.

#[cfg(test)]
mod tests {
    use crate::status::*;
    use chrono::DateTime;

    #[test]
    fn test_create_condition() {
        let condition = create_condition("Ready", "False", "ProviderError", "HTTP 403");

        assert_eq!(condition.r#type, "Ready");
        assert_eq!(condition.status, "False");
        assert_eq!(condition.reason.as_deref(), Some("ProviderError"));
        assert_eq!(condition.message.as_deref(), Some("HTTP 403"));
        assert!(!condition.is_ready());

        let stamp = condition.last_transition_time.unwrap();
        assert!(DateTime::parse_from_rfc3339(&stamp).is_ok());
    }

    #[test]
    fn test_condition_serializes_camel_case() {
        let condition = Condition {
            r#type: "Ready".to_string(),
            status: "True".to_string(),
            reason: None,
            message: None,
            last_transition_time: Some("2025-01-01T00:00:00+00:00".to_string()),
        };
        let json = serde_json::to_value(&condition).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "Ready",
                "status": "True",
                "lastTransitionTime": "2025-01-01T00:00:00+00:00",
            })
        );
        assert!(condition.is_ready());
    }
}
