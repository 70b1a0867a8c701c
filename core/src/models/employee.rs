//! Employee profile records.
//!
//! The wire form nests the account fields under `user`:
//!
//! ```json
//! {
//!   "resource_uri": "/api/v1/employees/5/",
//!   "job_position": "Engineer",
//!   "administrating": ["/api/v1/employee-groups/2/"],
//!   "profile_picture": "/media/profile.jpg",
//!   "user": {"username": "jfield", "first_name": "Jordan", "surname": "Field",
//!            "email": "j@x.com", "is_staff": true}
//! }
//! ```

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::marshal::{paths_to_json, ApiRecord, Fields};
use crate::resource::ResourcePath;

const USER_KEYS: &[&str] = &["username", "first_name", "surname", "email", "is_staff"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    pub resource_uri: ResourcePath,
    pub username: String,
    pub first_name: String,
    pub surname: String,
    pub email: String,
    pub is_staff: bool,
    pub job_position: String,
    pub profile_picture: Option<ResourcePath>,
    /// Groups this employee administrates.
    pub administrating: Vec<ResourcePath>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.surname)
    }

    /// True when the employee administrates the group at `group`.
    pub fn administrates(&self, group: &ResourcePath) -> bool {
        self.administrating.contains(group)
    }

    /// IDs of the administrated groups, in order.
    pub fn administrated_group_ids(&self) -> Vec<u64> {
        self.administrating.iter().filter_map(ResourcePath::id).collect()
    }
}

impl ApiRecord for Employee {
    const KIND: &'static str = "employee";
    const COLLECTION: &'static str = "employees/";
    const REQUIRED_KEYS: &'static [&'static str] =
        &["resource_uri", "job_position", "administrating", "user"];

    fn from_json(object: &Map<String, Value>) -> Result<Self, ApiError> {
        let fields = Fields::new(Self::KIND, object);
        fields.require(Self::REQUIRED_KEYS)?;
        let user = fields.object("user")?;
        user.require(USER_KEYS)?;

        Ok(Self {
            resource_uri: fields.path("resource_uri")?,
            username: user.string("username")?,
            first_name: user.string("first_name")?,
            surname: user.string("surname")?,
            email: user.string("email")?,
            is_staff: user.bool("is_staff")?,
            job_position: fields.string("job_position")?,
            profile_picture: fields.opt_path("profile_picture")?,
            administrating: fields.paths("administrating")?,
        })
    }

    fn to_json(&self) -> Map<String, Value> {
        let mut user = Map::new();
        user.insert("username".into(), self.username.clone().into());
        user.insert("first_name".into(), self.first_name.clone().into());
        user.insert("surname".into(), self.surname.clone().into());
        user.insert("email".into(), self.email.clone().into());
        user.insert("is_staff".into(), self.is_staff.into());

        let mut object = Map::new();
        object.insert("resource_uri".into(), self.resource_uri.as_str().into());
        object.insert("job_position".into(), self.job_position.clone().into());
        object.insert("user".into(), Value::Object(user));
        object.insert("administrating".into(), paths_to_json(&self.administrating));
        if let Some(picture) = &self.profile_picture {
            object.insert("profile_picture".into(), picture.as_str().into());
        }
        object
    }

    fn resource_uri(&self) -> &ResourcePath {
        &self.resource_uri
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Value {
        json!({
            "resource_uri": "/api/v1/employees/5/",
            "job_position": "Engineer",
            "administrating": ["/api/v1/employee-groups/2/"],
            "profile_picture": "/media/profile.jpg",
            "user": {
                "username": "jfield",
                "first_name": "Jordan",
                "surname": "Field",
                "email": "j@x.com",
                "is_staff": true
            }
        })
    }

    fn parse(value: &Value) -> Result<Employee, ApiError> {
        Employee::from_json(value.as_object().unwrap())
    }

    #[test]
    fn parses_nested_user_fields() {
        let employee = parse(&sample()).unwrap();
        assert_eq!(employee.username, "jfield");
        assert_eq!(employee.full_name(), "Jordan Field");
        assert!(employee.is_staff);
        assert_eq!(employee.id(), Some(5));
        assert_eq!(employee.profile_picture.as_ref().unwrap().as_str(), "/media/profile.jpg");
        assert_eq!(employee.administrated_group_ids(), vec![2]);
    }

    #[test]
    fn round_trips_through_dictionary_form() {
        let employee = parse(&sample()).unwrap();
        let back = Employee::from_json(&employee.to_json()).unwrap();
        assert_eq!(back, employee);
    }

    #[test]
    fn missing_picture_stays_absent() {
        let mut value = sample();
        value["profile_picture"] = Value::Null;
        let employee = parse(&value).unwrap();
        assert!(employee.profile_picture.is_none());
        assert!(!employee.to_json().contains_key("profile_picture"));
    }

    #[test]
    fn every_required_key_is_enforced() {
        for key in Employee::REQUIRED_KEYS {
            let mut value = sample();
            value.as_object_mut().unwrap().remove(*key);
            assert!(matches!(parse(&value), Err(ApiError::DataConversionFailed(_))), "{key}");
        }
        for key in USER_KEYS {
            let mut value = sample();
            value["user"].as_object_mut().unwrap().remove(*key);
            assert!(matches!(parse(&value), Err(ApiError::DataConversionFailed(_))), "user.{key}");
        }
    }

    #[test]
    fn malformed_resource_uri_is_a_missing_field() {
        let mut value = sample();
        value["resource_uri"] = json!(17);
        assert!(matches!(parse(&value), Err(ApiError::DataConversionFailed(_))));
    }

    #[test]
    fn administrating_must_be_a_list_of_paths() {
        let mut value = sample();
        value["administrating"] = json!("/api/v1/employee-groups/2/");
        assert!(parse(&value).is_err());
    }
}
