use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9]{10,13}$").unwrap();
    static ref SLUG_RE: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
    static ref NON_SLUG_RE: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// Phone numbers: optional leading `+`, then 10 to 13 digits. Spaces and dashes are ignored.
pub fn is_valid_phone(raw: &str) -> bool {
    PHONE_RE.is_match(&normalize_phone(raw))
}

pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect()
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

/// "Hot Beverages & Tea" -> "hot-beverages-tea"
pub fn slugify(name: &str) -> String {
    NON_SLUG_RE
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_numbers() {
        assert!(is_valid_phone("9876543210"));
        assert!(is_valid_phone("+91 98765-43210"));
        assert!(!is_valid_phone("98765"));
        assert!(!is_valid_phone("98765abc10"));
        assert!(!is_valid_phone("++919876543210"));
        assert_eq!(normalize_phone("+91 98765-43210"), "+919876543210");
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Hot Beverages & Tea"), "hot-beverages-tea");
        assert_eq!(slugify("  Chips!! "), "chips");
        assert!(is_valid_slug("hot-beverages"));
        assert!(!is_valid_slug("Hot Beverages"));
        assert!(!is_valid_slug("-chips"));
        assert!(!is_valid_slug(""));
    }
}
