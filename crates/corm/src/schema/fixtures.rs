//! Hand-written models shared by unit tests.

use super::{FieldDecl, Model, Shape};
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub(crate) struct User {
    pub id: i64,
    pub name: String,
    pub age: i32,
}

impl User {
    pub fn new(id: i64, name: &str, age: i32) -> Self {
        Self {
            id,
            name: name.to_string(),
            age,
        }
    }
}

impl Model for User {
    fn shape() -> Shape {
        Shape::new("User")
            .field(FieldDecl::new("id", Some("id,pk"), "i64"))
            .field(FieldDecl::new("name", None, "String"))
            .field(FieldDecl::new("age", Some("age,omitempty"), "i32"))
    }

    fn table_name() -> Option<String> {
        Some("users".to_string())
    }

    fn field_value(&self, path: &[usize]) -> Option<Value> {
        match path {
            [0] => Some(self.id.into()),
            [1] => Some(self.name.as_str().into()),
            [2] => Some(self.age.into()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Audit {
    pub created_by: String,
    pub version: i64,
}

impl Model for Audit {
    fn shape() -> Shape {
        Shape::new("Audit")
            .field(FieldDecl::new("created_by", None, "String"))
            .field(FieldDecl::new("version", Some("version,readonly"), "i64"))
    }

    fn field_value(&self, path: &[usize]) -> Option<Value> {
        match path {
            [0] => Some(self.created_by.as_str().into()),
            [1] => Some(self.version.into()),
            _ => None,
        }
    }
}

/// Implicit `id` key, a skipped field and an embedded struct.
#[derive(Debug, Clone, Default)]
pub(crate) struct BlogPost {
    pub id: i64,
    pub title: String,
    pub cached_html: String,
    pub audit: Audit,
    pub view_count: i64,
}

impl Model for BlogPost {
    fn shape() -> Shape {
        Shape::new("BlogPost")
            .field(FieldDecl::new("id", Some(",auto"), "i64"))
            .field(FieldDecl::new("title", None, "String"))
            .field(FieldDecl::new("cached_html", Some("-"), "String"))
            .field(FieldDecl::embedded("audit", "Audit", Audit::shape))
            .field(FieldDecl::new("view_count", Some("views,omitempty"), "i64"))
    }

    fn field_value(&self, path: &[usize]) -> Option<Value> {
        match path {
            [0] => Some(self.id.into()),
            [1] => Some(self.title.as_str().into()),
            [3, rest @ ..] => self.audit.field_value(rest),
            [4] => Some(self.view_count.into()),
            _ => None,
        }
    }
}

/// Optional embedded struct.
#[derive(Debug, Clone, Default)]
pub(crate) struct Draft {
    pub id: i64,
    pub audit: Option<Audit>,
}

impl Model for Draft {
    fn shape() -> Shape {
        Shape::new("Draft")
            .field(FieldDecl::new("id", None, "i64"))
            .field(FieldDecl::embedded("audit", "Option<Audit>", Audit::shape))
    }

    fn field_value(&self, path: &[usize]) -> Option<Value> {
        match path {
            [0] => Some(self.id.into()),
            [1, rest @ ..] => self.audit.as_ref()?.field_value(rest),
            _ => None,
        }
    }
}

/// Table override that is not a valid identifier.
#[derive(Debug, Clone, Default)]
pub(crate) struct Ghost {
    pub id: i64,
    pub name: String,
}

impl Model for Ghost {
    fn shape() -> Shape {
        Shape::new("Ghost")
            .field(FieldDecl::new("id", None, "i64"))
            .field(FieldDecl::new("name", None, "String"))
    }

    fn table_name() -> Option<String> {
        Some("bad table".to_string())
    }

    fn field_value(&self, path: &[usize]) -> Option<Value> {
        match path {
            [0] => Some(self.id.into()),
            [1] => Some(self.name.as_str().into()),
            _ => None,
        }
    }
}
