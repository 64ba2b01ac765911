use serde::Deserialize;

use bookshelf_http::Violation;

use crate::serializer::{Exposed, Field};
use crate::validation::{Validate, Violations};

/// Serialization group used by every book endpoint.
pub const GET_BOOKS: &str = "getBooks";

/// Author referenced by books.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl Exposed for Author {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("id", &[GET_BOOKS], self.id),
            Field::new("firstName", &[GET_BOOKS], self.first_name.as_str()),
            Field::new("lastName", &[GET_BOOKS], self.last_name.as_str()),
        ]
    }
}

/// A book in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Book {
    /// Assigned by the store on insert
    pub id: Option<i64>,
    pub title: String,
    pub cover_text: String,
    /// Librarian's note, exposed from API version 2.0
    pub comment: Option<String>,
    pub author: Option<Author>,
}

impl Exposed for Book {
    fn fields(&self) -> Vec<Field<'_>> {
        vec![
            Field::new("id", &[GET_BOOKS], self.id),
            Field::new("title", &[GET_BOOKS], self.title.as_str()),
            Field::new("coverText", &[GET_BOOKS], self.cover_text.as_str()),
            Field::new("comment", &[GET_BOOKS], self.comment.as_deref()).since("2.0"),
            Field::nested(
                "author",
                &[GET_BOOKS],
                self.author.as_ref().map(|author| author as &dyn Exposed),
            ),
        ]
    }
}

impl Validate for Book {
    fn validate(&self) -> Vec<Violation> {
        let mut violations = Violations::new();
        violations
            .not_blank("title", &self.title)
            .length("title", &self.title, 1, 255)
            .length("coverText", &self.cover_text, 0, 4000);
        if let Some(comment) = &self.comment {
            violations.length("comment", comment, 0, 1000);
        }
        violations.finish()
    }
}

/// Request body accepted by create and update.
///
/// Absent keys stay `None`; on update they leave the stored value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPayload {
    pub title: Option<String>,
    pub cover_text: Option<String>,
    pub comment: Option<String>,
    pub id_author: Option<i64>,
}

impl BookPayload {
    /// Author id to resolve; `-1` means "no author".
    pub fn author_id(&self) -> i64 {
        self.id_author.unwrap_or(-1)
    }

    /// Build a new, unsaved book. The author is resolved separately.
    pub fn to_book(&self) -> Book {
        Book {
            id: None,
            title: self.title.clone().unwrap_or_default(),
            cover_text: self.cover_text.clone().unwrap_or_default(),
            comment: self.comment.clone(),
            author: None,
        }
    }

    /// Overwrite the fields present in the payload.
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(title) = &self.title {
            book.title = title.clone();
        }
        if let Some(cover_text) = &self.cover_text {
            book.cover_text = cover_text.clone();
        }
        if let Some(comment) = &self.comment {
            book.comment = Some(comment.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::{serialize, SerializationContext};
    use serde_json::Value;

    fn book() -> Book {
        Book {
            id: Some(3),
            title: "Dune".to_string(),
            cover_text: "Spice".to_string(),
            comment: Some("Classic".to_string()),
            author: Some(Author {
                id: 1,
                first_name: "Frank".to_string(),
                last_name: "Herbert".to_string(),
            }),
        }
    }

    fn render(book: &Book, version: Option<&str>) -> Value {
        let context = SerializationContext::with_groups(&[GET_BOOKS])
            .version(version.map(|raw| raw.parse().unwrap()));
        serde_json::from_slice(&serialize(book, &context).unwrap()).unwrap()
    }

    #[test]
    fn book_wire_shape_is_camel_case() {
        let body = render(&book(), None);
        assert_eq!(body["id"], 3);
        assert_eq!(body["coverText"], "Spice");
        assert_eq!(body["author"]["firstName"], "Frank");
        assert_eq!(body["author"]["lastName"], "Herbert");
    }

    #[test]
    fn comment_appears_from_version_two() {
        assert!(render(&book(), None).get("comment").is_none());
        assert!(render(&book(), Some("1.0")).get("comment").is_none());
        assert_eq!(render(&book(), Some("2.0"))["comment"], "Classic");
    }

    #[test]
    fn blank_title_is_invalid() {
        let mut invalid = book();
        invalid.title = "  ".to_string();
        invalid.comment = Some("x".repeat(1001));

        let violations = invalid.validate();
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["title", "comment"]);
        assert!(book().validate().is_empty());
    }

    #[test]
    fn payload_only_overwrites_present_fields() {
        let payload: BookPayload = serde_json::from_str(r#"{"title": "Dune Messiah"}"#).unwrap();
        let mut current = book();
        payload.apply_to(&mut current);

        assert_eq!(current.title, "Dune Messiah");
        assert_eq!(current.cover_text, "Spice");
        assert_eq!(current.comment.as_deref(), Some("Classic"));
        assert_eq!(payload.author_id(), -1);
    }

    #[test]
    fn payload_reads_author_id() {
        let payload: BookPayload =
            serde_json::from_str(r#"{"title": "T", "coverText": "C", "idAuthor": 7}"#).unwrap();
        assert_eq!(payload.author_id(), 7);

        let fresh = payload.to_book();
        assert_eq!(fresh.id, None);
        assert_eq!(fresh.cover_text, "C");
        assert!(fresh.author.is_none());
    }
}
