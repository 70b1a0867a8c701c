//! Employee group records.
//!
//! `members` and `admins` are resource paths. `members_full`, when the
//! server includes it, carries the expanded member profiles as
//! `[{"employee": {...}}, ...]`; it is read-only and never sent back.

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::marshal::{paths_to_json, ApiRecord, Fields};
use crate::models::Employee;
use crate::resource::ResourcePath;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeGroup {
    pub resource_uri: ResourcePath,
    pub name: String,
    pub parent_group: Option<ResourcePath>,
    pub members: Vec<ResourcePath>,
    pub admins: Vec<ResourcePath>,
    pub member_profiles: Vec<Employee>,
}

impl EmployeeGroup {
    /// The name with each word capitalised. Whitespace is kept as is.
    pub fn title(&self) -> String {
        self.name
            .split_inclusive(char::is_whitespace)
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.flat_map(char::to_lowercase))
                        .collect::<String>(),
                    None => String::new(),
                }
            })
            .collect()
    }

    pub fn is_admin(&self, employee: &ResourcePath) -> bool {
        self.admins.contains(employee)
    }

    /// Expanded members paired with their admin flag.
    pub fn members_with_flags(&self) -> impl Iterator<Item = (bool, &Employee)> + '_ {
        self.member_profiles
            .iter()
            .map(move |employee| (self.is_admin(&employee.resource_uri), employee))
    }
}

impl ApiRecord for EmployeeGroup {
    const KIND: &'static str = "employee group";
    const COLLECTION: &'static str = "employee-groups/";
    const REQUIRED_KEYS: &'static [&'static str] = &["resource_uri", "name", "members"];

    fn from_json(object: &Map<String, Value>) -> Result<Self, ApiError> {
        let fields = Fields::new(Self::KIND, object);
        fields.require(Self::REQUIRED_KEYS)?;

        let member_profiles = fields
            .opt_array("members_full")?
            .iter()
            .map(|entry| {
                let employee = entry
                    .get("employee")
                    .and_then(Value::as_object)
                    .ok_or_else(|| ApiError::conversion(Self::KIND, "members_full"))?;
                Employee::from_json(employee)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            resource_uri: fields.path("resource_uri")?,
            name: fields.string("name")?,
            parent_group: fields.opt_path("parent_group")?,
            members: fields.paths("members")?,
            admins: fields.opt_paths("admins")?,
            member_profiles,
        })
    }

    fn to_json(&self) -> Map<String, Value> {
        let mut object = Map::new();
        object.insert("resource_uri".into(), self.resource_uri.as_str().into());
        object.insert("name".into(), self.name.clone().into());
        if let Some(parent) = &self.parent_group {
            object.insert("parent_group".into(), parent.as_str().into());
        }
        object.insert("members".into(), paths_to_json(&self.members));
        object.insert("admins".into(), paths_to_json(&self.admins));
        object
    }

    fn resource_uri(&self) -> &ResourcePath {
        &self.resource_uri
    }
}
