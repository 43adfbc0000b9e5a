use serde::{Deserialize, Serialize};

/// A named label attachable to many terms. Names are unique, case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}
