//! Request payloads for creating records.
//!
//! Drafts have no resource path yet, so they are separate types serialised
//! with serde rather than records with a placeholder identity. Optional
//! fields are omitted when unset so the server applies its defaults.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

use crate::marshal::ApiRecord;
use crate::models::schedule::DATETIME_FORMAT;
use crate::models::{EmployeeGroup, Priority, ScheduleItem, ToDoListItem};
use crate::resource::ResourcePath;

/// A creation payload for record type `Record`.
pub trait Draft: Serialize {
    type Record: ApiRecord;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_group: Option<ResourcePath>,
    pub members: Vec<ResourcePath>,
    pub admins: Vec<ResourcePath>,
}

impl Draft for NewGroup {
    type Record = EmployeeGroup;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewToDoItem {
    pub group: ResourcePath,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_date: Option<NaiveDate>,
    pub employees: Vec<ResourcePath>,
}

impl Draft for NewToDoItem {
    type Record = ToDoListItem;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewScheduleItem {
    pub group: ResourcePath,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: Priority,
    #[serde(serialize_with = "wire_datetime")]
    pub start: NaiveDateTime,
    #[serde(serialize_with = "wire_datetime")]
    pub end: NaiveDateTime,
    pub employees: Vec<ResourcePath>,
}

impl Draft for NewScheduleItem {
    type Record = ScheduleItem;
}

fn wire_datetime<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&value.format(DATETIME_FORMAT))
}
