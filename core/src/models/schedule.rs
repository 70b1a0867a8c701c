//! Schedule items: events with a start and end time.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::marshal::{paths_to_json, ApiRecord, Fields};
use crate::models::{parse_assignees, Employee, Priority};
use crate::resource::ResourcePath;

pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleItem {
    pub resource_uri: ResourcePath,
    pub group: ResourcePath,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub employees: Vec<ResourcePath>,
    pub assigned_employees: Vec<Employee>,
}

impl ApiRecord for ScheduleItem {
    const KIND: &'static str = "schedule item";
    const COLLECTION: &'static str = "schedule-items/";
    const REQUIRED_KEYS: &'static [&'static str] =
        &["resource_uri", "group", "title", "priority", "start", "end"];

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
            start: fields.datetime("start", DATETIME_FORMAT)?,
            end: fields.datetime("end", DATETIME_FORMAT)?,
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
        object.insert("start".into(), self.start.format(DATETIME_FORMAT).to_string().into());
        object.insert("end".into(), self.end.format(DATETIME_FORMAT).to_string().into());
        object.insert("employees".into(), paths_to_json(&self.employees));
        object
    }

    fn resource_uri(&self) -> &ResourcePath {
        &self.resource_uri
    }
}
