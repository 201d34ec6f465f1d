use serde::{Deserialize, Serialize};

pub trait Owned {
    fn id(&self) -> &str;
    fn owner(&self) -> &str;
    fn created_at_ms(&self) -> i64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub owner: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at_ms: Option<i64>,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub owner: String,
    pub body: String,
    pub created_at_ms: i64,
}

impl Owned for Reminder {
    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }
}

impl Owned for Note {
    fn id(&self) -> &str {
        &self.id
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }
}
