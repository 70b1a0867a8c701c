//! Domain records exchanged with the backend.
//!
//! Each record implements `ApiRecord`: required and optional keys, parsing
//! from a JSON object, and a canonical dictionary form for request bodies.

mod drafts;
mod employee;
mod group;
mod priority;
mod schedule;
mod todo;

pub use drafts::{Draft, NewGroup, NewScheduleItem, NewToDoItem};
pub use employee::Employee;
pub use group::EmployeeGroup;
pub use priority::Priority;
pub use schedule::ScheduleItem;
pub use todo::ToDoListItem;

use serde_json::Value;

use crate::error::ApiError;
use crate::marshal::{ApiRecord, Fields};
use crate::resource::ResourcePath;

/// Items that belong to a group, held as a lazy reference.
pub trait GroupScoped {
    fn group(&self) -> &ResourcePath;
}

impl GroupScoped for ToDoListItem {
    fn group(&self) -> &ResourcePath {
        &self.group
    }
}

impl GroupScoped for ScheduleItem {
    fn group(&self) -> &ResourcePath {
        &self.group
    }
}

/// Assigned employees of an item. The server sends expanded employee
/// objects, while request bodies carry bare paths, so both are accepted.
fn parse_assignees(
    fields: &Fields<'_>,
    kind: &str,
    key: &str,
) -> Result<(Vec<ResourcePath>, Vec<Employee>), ApiError> {
    let mut paths = Vec::new();
    let mut profiles = Vec::new();
    for entry in fields.opt_array(key)? {
        match entry {
            Value::String(raw) => {
                paths.push(ResourcePath::parse(raw).ok_or_else(|| ApiError::conversion(kind, key))?);
            }
            Value::Object(object) => {
                let employee = Employee::from_json(object)?;
                paths.push(employee.resource_uri.clone());
                profiles.push(employee);
            }
            _ => return Err(ApiError::conversion(kind, key)),
        }
    }
    Ok((paths, profiles))
}
