//! Topic pattern matching on dot-separated routing keys.
//!
//! `*` matches exactly one segment; `#` matches zero or more segments.

/// Does `pattern` match `key`?
pub fn matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    segments_match(&pattern, &key)
}

fn segments_match(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| segments_match(rest, &key[skip..])),
        Some((&"*", rest)) => match key.split_first() {
            Some((_, key_rest)) => segments_match(rest, key_rest),
            None => false,
        },
        Some((segment, rest)) => match key.split_first() {
            Some((head, key_rest)) if segment == head => segments_match(rest, key_rest),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::matches;

    #[test]
    fn exact_keys_match_themselves() {
        assert!(matches("events.product.create", "events.product.create"));
        assert!(!matches("events.product.create", "events.product.update"));
    }

    #[test]
    fn trailing_hash_matches_every_operation() {
        for op in ["create", "update", "delete"] {
            assert!(matches("events.product.#", &format!("events.product.{op}")));
        }
    }

    #[test]
    fn hash_matches_zero_segments() {
        assert!(matches("events.product.#", "events.product"));
    }

    #[test]
    fn hash_matches_multiple_segments() {
        assert!(matches("events.#", "events.product.create.v2"));
    }

    #[test]
    fn star_matches_exactly_one_segment() {
        assert!(matches("events.*.create", "events.product.create"));
        assert!(!matches("events.*.create", "events.create"));
        assert!(!matches("events.*", "events.product.create"));
    }

    #[test]
    fn unrelated_entity_kind_does_not_match() {
        assert!(!matches("events.product.#", "events.widget.create"));
    }
}
