//! Entity validation.

use bookshelf_http::Violation;

/// Entities that can check their own invariants before persistence.
pub trait Validate {
    /// All violations, in field declaration order. Empty when valid.
    fn validate(&self) -> Vec<Violation>;
}

/// Collects violations for one entity.
#[derive(Debug, Default)]
pub struct Violations {
    items: Vec<Violation>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn not_blank(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.items
                .push(Violation::new(field, "This value should not be blank."));
        }
        self
    }

    /// Character length bounds; blank values are left to [`Self::not_blank`].
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        if value.is_empty() {
            return self;
        }
        let len = value.chars().count();
        if len < min {
            self.items.push(Violation::new(
                field,
                format!("This value is too short. It should have {min} characters or more."),
            ));
        } else if len > max {
            self.items.push(Violation::new(
                field,
                format!("This value is too long. It should have {max} characters or less."),
            ));
        }
        self
    }

    pub fn finish(self) -> Vec<Violation> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_reported_once() {
        let mut violations = Violations::new();
        violations.not_blank("title", "   ").length("title", "   ", 1, 255);
        let found = violations.finish();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].field, "title");
    }

    #[test]
    fn length_is_counted_in_characters() {
        let mut violations = Violations::new();
        violations.length("title", "ééé", 1, 3);
        assert!(violations.finish().is_empty());

        let mut violations = Violations::new();
        violations.length("title", "abcd", 1, 3);
        assert_eq!(violations.finish()[0].field, "title");
    }

    #[test]
    fn short_values_are_reported() {
        let mut violations = Violations::new();
        violations.length("code", "a", 2, 10);
        assert!(violations.finish()[0].message.contains("too short"));
    }
}
