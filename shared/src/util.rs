/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate an opaque document id (orders, notifications).
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Normalize a phone number to the ledger key: digits only.
///
/// `"+91 98765-43210"` → `"919876543210"`. Returns an empty string when the
/// input holds no digits; callers treat that as "no phone".
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalize a restaurant identifier to its namespace key (trimmed, uppercase).
pub fn normalize_namespace(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone_strips_non_digits() {
        assert_eq!(normalize_phone("+91 98765-43210"), "919876543210");
        assert_eq!(normalize_phone("(555) 010.2000"), "5550102000");
        assert_eq!(normalize_phone("n/a"), "");
    }

    #[test]
    fn test_normalize_namespace() {
        assert_eq!(normalize_namespace("  spice-garden "), "SPICE-GARDEN");
    }

    #[test]
    fn test_document_ids_are_unique() {
        let a = new_document_id();
        let b = new_document_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }
}
