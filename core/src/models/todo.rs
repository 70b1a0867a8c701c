//! To-do list items.
//!
//! Dates use `%Y-%m-%d` in both directions. The `group` field is a lazy
//! reference: only its path is held, and the group itself is fetched on
//! request through `BizzorgClient::resolve_group`.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::marshal::{paths_to_json, ApiRecord, Fields};
use crate::models::{parse_assignees, Employee, Priority};
use crate::resource::ResourcePath;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToDoListItem {
    pub resource_uri: ResourcePath,
    pub group: ResourcePath,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub completed: bool,
    pub created_date: NaiveDate,
    pub deadline_date: Option<NaiveDate>,
    pub employees: Vec<ResourcePath>,
    /// Expanded profiles, when the server sent them.
    pub assigned_employees: Vec<Employee>,
}

impl ApiRecord for ToDoListItem {
    const KIND: &'static str = "to-do item";
    const COLLECTION: &'static str = "todolist-items/";
    const REQUIRED_KEYS: &'static [&'static str] =
        &["resource_uri", "group", "title", "priority", "completed", "date_created"];

    fn from_json(object: &Map<String, Value>) -> Result<Self, ApiError> {
        let fields = Fields::new(Self::KIND, object);
        fields.require(Self::REQUIRED_KEYS)?;
        let (employees, assigned_employees) = parse_assignees(&fields, Self::KIND, "employees")?;

        Ok(Self {
            resource_uri: fields.path("resource_uri")?,
            group: fields.path("group")?,
            title: fields.string("title")?,
            description: fields.opt_string("description")?,
            priority: fields.decode("priority")?,
            completed: fields.bool("completed")?,
            created_date: fields.date("date_created", DATE_FORMAT)?,
            deadline_date: fields.opt_date("deadline_date", DATE_FORMAT)?,
            employees,
            assigned_employees,
        })
    }

    fn to_json(&self) -> Map<String, Value> {
        let mut object = Map::new();
        object.insert("resource_uri".into(), self.resource_uri.as_str().into());
        object.insert("group".into(), self.group.as_str().into());
        object.insert("title".into(), self.title.clone().into());
        if let Some(description) = &self.description {
            object.insert("description".into(), description.clone().into());
        }
        object.insert("priority".into(), self.priority.code().into());
        object.insert("completed".into(), self.completed.into());
        object.insert(
            "date_created".into(),
            self.created_date.format(DATE_FORMAT).to_string().into(),
        );
        if let Some(deadline) = &self.deadline_date {
            object.insert("deadline_date".into(), deadline.format(DATE_FORMAT).to_string().into());
        }
        object.insert("employees".into(), paths_to_json(&self.employees));
        object
    }

    fn resource_uri(&self) -> &ResourcePath {
        &self.resource_uri
    }
}
