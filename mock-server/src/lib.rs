//! In-memory stand-in for the Bizzorg backend.
//!
//! Serves the site routes (login, logout, profile picture upload, media) and
//! the `/api/v1/` record collections with the same wire shapes the real
//! backend uses: list responses wrapped in `{"meta", "objects"}`, records
//! linked by resource path, `Location` on create. Mutating routes require an
//! `X-CSRFToken` header matching a token issued at login.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub const API_ROOT: &str = "/api/v1/";
const CSRF_HEADER: &str = "x-csrftoken";

type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Employees,
    Groups,
    TodoItems,
    ScheduleItems,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Employees,
        Collection::Groups,
        Collection::TodoItems,
        Collection::ScheduleItems,
    ];

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.segment() == segment)
    }

    pub fn segment(self) -> &'static str {
        match self {
            Collection::Employees => "employees",
            Collection::Groups => "employee-groups",
            Collection::TodoItems => "todolist-items",
            Collection::ScheduleItems => "schedule-items",
        }
    }

    pub fn path(self, id: u64) -> String {
        format!("{API_ROOT}{}/{id}/", self.segment())
    }

    /// Keys a create payload must carry.
    fn required(self) -> &'static [&'static str] {
        match self {
            Collection::Employees => &["job_position", "user"],
            Collection::Groups => &["name", "members"],
            Collection::TodoItems => &["group", "title", "priority"],
            Collection::ScheduleItems => &["group", "title", "priority", "start", "end"],
        }
    }
}

/// Id of a record path like `/api/v1/employees/5/`.
pub fn path_id(path: &str) -> Option<u64> {
    path.split('/').nth(4)?.parse().ok()
}

struct Account {
    username: &'static str,
    password: &'static str,
    employee: u64,
}

#[derive(Default)]
pub struct Backend {
    records: BTreeMap<Collection, BTreeMap<u64, Record>>,
    next_id: HashMap<Collection, u64>,
    accounts: Vec<Account>,
    csrf_tokens: HashSet<String>,
    media: HashMap<String, Vec<u8>>,
}

impl Backend {
    /// A backend seeded with three employees, their groups and some work.
    pub fn seeded() -> Self {
        let mut backend = Self::default();
        let employee = |id| Value::from(Collection::Employees.path(id));
        let group = |id| Value::from(Collection::Groups.path(id));

        for (username, first, surname, job, staff) in [
            ("jfield", "Jordan", "Field", "Operations Manager", true),
            ("amoss", "Alex", "Moss", "Technician", false),
            ("rkhan", "Riya", "Khan", "Accountant", false),
        ] {
            let id = backend.insert(
                Collection::Employees,
                json!({
                    "job_position": job,
                    "profile_picture": null,
                    "user": {
                        "username": username,
                        "first_name": first,
                        "surname": surname,
                        "email": format!("{username}@bizzorg.test"),
                        "is_staff": staff
                    }
                }),
            );
            backend.accounts.push(Account {
                username,
                password: "password",
                employee: id,
            });
        }

        backend.insert(
            Collection::Groups,
            json!({"name": "head office", "parent_group": null,
                   "members": [employee(1), employee(2), employee(3)], "admins": [employee(1)]}),
        );
        backend.insert(
            Collection::Groups,
            json!({"name": "field operations", "parent_group": group(1),
                   "members": [employee(1), employee(2)], "admins": [employee(1)]}),
        );
        backend.insert(
            Collection::Groups,
            json!({"name": "accounts", "parent_group": group(1),
                   "members": [employee(3)], "admins": [employee(3)]}),
        );

        backend.insert(
            Collection::TodoItems,
            json!({"group": group(2), "title": "order replacement parts", "description": null,
                   "priority": "urg", "completed": false, "date_created": "2016-07-13",
                   "deadline_date": "2016-08-01", "employees": [employee(2)]}),
        );
        backend.insert(
            Collection::TodoItems,
            json!({"group": group(3), "title": "file quarterly returns",
                   "description": "Q3 figures", "priority": "sig", "completed": false,
                   "date_created": "2016-07-01", "deadline_date": null, "employees": []}),
        );

        backend.insert(
            Collection::ScheduleItems,
            json!({"group": group(1), "title": "weekly stand-up", "description": null,
                   "priority": "reg", "start": "2016-09-21T09:00:00", "end": "2016-09-21T09:15:00",
                   "employees": [employee(1), employee(2), employee(3)]}),
        );
        backend.insert(
            Collection::ScheduleItems,
            json!({"group": group(2), "title": "site visit", "description": "North depot",
                   "priority": "sig", "start": "2016-09-22T13:00:00", "end": "2016-09-22T17:00:00",
                   "employees": [employee(2)]}),
        );
        backend
    }

    fn insert(&mut self, collection: Collection, value: Value) -> u64 {
        let next = self.next_id.entry(collection).or_insert(1);
        let id = *next;
        *next += 1;
        let mut record = match value {
            Value::Object(record) => record,
            _ => Record::new(),
        };
        record.insert("resource_uri".into(), collection.path(id).into());
        self.records.entry(collection).or_default().insert(id, record);
        id
    }

    fn get(&self, collection: Collection, id: u64) -> Option<&Record> {
        self.records.get(&collection)?.get(&id)
    }

    fn get_mut(&mut self, collection: Collection, id: u64) -> Option<&mut Record> {
        self.records.get_mut(&collection)?.get_mut(&id)
    }

    fn check_csrf(&self, headers: &HeaderMap) -> Result<(), StatusCode> {
        match headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) {
            Some(token) if self.csrf_tokens.contains(token) => Ok(()),
            _ => Err(StatusCode::FORBIDDEN),
        }
    }

    /// A stored record in wire form, with computed fields filled in.
    fn render(&self, collection: Collection, id: u64) -> Option<Value> {
        let mut record = self.get(collection, id)?.clone();
        match collection {
            Collection::Employees => {
                let own = Value::from(collection.path(id));
                let administrating: Vec<Value> = self
                    .records
                    .get(&Collection::Groups)
                    .into_iter()
                    .flatten()
                    .filter(|(_, group)| contains(group, "admins", &own))
                    .filter_map(|(_, group)| group.get("resource_uri").cloned())
                    .collect();
                record.insert("administrating".into(), administrating.into());
            }
            Collection::Groups => {
                let members_full: Vec<Value> = record
                    .get("members")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .filter_map(path_id)
                    .filter_map(|member| self.render(Collection::Employees, member))
                    .map(|employee| json!({ "employee": employee }))
                    .collect();
                record.insert("members_full".into(), members_full.into());
            }
            Collection::TodoItems | Collection::ScheduleItems => {}
        }
        Some(Value::Object(record))
    }

    /// Whether a record passes every recognised filter in `query`.
    fn matches(&self, record: &Record, query: &HashMap<String, String>) -> bool {
        query.iter().all(|(key, value)| {
            let Ok(id) = value.parse::<u64>() else {
                return true;
            };
            match key.as_str() {
                "members" => contains(record, "members", &Value::from(Collection::Employees.path(id))),
                "parent_group" => record.get("parent_group") == Some(&Value::from(Collection::Groups.path(id))),
                "group" => record.get("group") == Some(&Value::from(Collection::Groups.path(id))),
                "group__members" => record
                    .get("group")
                    .and_then(Value::as_str)
                    .and_then(path_id)
                    .and_then(|group| self.get(Collection::Groups, group))
                    .is_some_and(|group| contains(group, "members", &Value::from(Collection::Employees.path(id)))),
                _ => true,
            }
        })
    }
}

fn contains(record: &Record, key: &str, needle: &Value) -> bool {
    record
        .get(key)
        .and_then(Value::as_array)
        .is_some_and(|items| items.contains(needle))
}

fn listing(objects: Vec<Value>) -> Json<Value> {
    Json(json!({
        "meta": { "total_count": objects.len() },
        "objects": objects
    }))
}

pub type Db = Arc<RwLock<Backend>>;

pub fn app() -> Router {
    app_with(Backend::seeded())
}

pub fn app_with(backend: Backend) -> Router {
    let db: Db = Arc::new(RwLock::new(backend));
    Router::new()
        .route("/groups/login/", post(login))
        .route("/groups/logout/", post(logout))
        .route("/groups/update_profile_picture/", post(update_profile_picture))
        .route("/media/{*path}", get(media))
        .route("/api/v1/{collection}/", get(list_records).post(create_record))
        .route("/api/v1/{collection}/set/{ids}/", get(record_set))
        .route(
            "/api/v1/{collection}/{id}/",
            get(get_record).patch(update_record).delete(delete_record),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// Site routes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

async fn login(State(db): State<Db>, Form(input): Form<Credentials>) -> Result<Response, StatusCode> {
    let mut backend = db.write().await;
    let employee = backend
        .accounts
        .iter()
        .find(|a| a.username == input.username && a.password == input.password)
        .map(|a| a.employee)
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let body = backend
        .render(Collection::Employees, employee)
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let csrf = Uuid::new_v4().simple().to_string();
    backend.csrf_tokens.insert(csrf.clone());
    info!(username = %input.username, "login");

    let cookies = AppendHeaders([
        (header::SET_COOKIE, format!("csrftoken={csrf}; Path=/")),
        (header::SET_COOKIE, format!("sessionid={}; Path=/; HttpOnly", Uuid::new_v4().simple())),
    ]);
    Ok((StatusCode::OK, cookies, Json(body)).into_response())
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> Result<StatusCode, StatusCode> {
    let mut backend = db.write().await;
    backend.check_csrf(&headers)?;
    if let Some(token) = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) {
        backend.csrf_tokens.remove(token);
    }
    Ok(StatusCode::OK)
}

async fn update_profile_picture(
    State(db): State<Db>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<String, StatusCode> {
    db.read().await.check_csrf(&headers)?;

    let mut picture = None;
    let mut user = None;
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("new_profile_picture") => {
                picture = Some(field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?.to_vec());
            }
            Some("user") => {
                let text = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
                user = Some(text.trim().parse::<u64>().map_err(|_| StatusCode::BAD_REQUEST)?);
            }
            _ => {}
        }
    }
    let (Some(picture), Some(user)) = (picture, user) else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let mut backend = db.write().await;
    let path = format!("/media/profile_pictures/{user}.jpg");
    let employee = backend
        .get_mut(Collection::Employees, user)
        .ok_or(StatusCode::NOT_FOUND)?;
    employee.insert("profile_picture".into(), path.clone().into());
    backend.media.insert(path.clone(), picture);
    Ok(path)
}

async fn media(State(db): State<Db>, Path(path): Path<String>) -> Result<Vec<u8>, StatusCode> {
    let backend = db.read().await;
    backend
        .media
        .get(&format!("/media/{path}"))
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)
}

// ---------------------------------------------------------------------------
// Record collections
// ---------------------------------------------------------------------------

fn collection(segment: &str) -> Result<Collection, StatusCode> {
    Collection::from_segment(segment).ok_or(StatusCode::NOT_FOUND)
}

async fn list_records(
    State(db): State<Db>,
    Path(segment): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    let collection = collection(&segment)?;
    let backend = db.read().await;
    let objects = backend
        .records
        .get(&collection)
        .into_iter()
        .flatten()
        .filter(|(_, record)| backend.matches(record, &query))
        .filter_map(|(id, _)| backend.render(collection, *id))
        .collect();
    Ok(listing(objects))
}

async fn record_set(
    State(db): State<Db>,
    Path((segment, ids)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let collection = collection(&segment)?;
    let ids = ids
        .split(';')
        .map(str::parse::<u64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| StatusCode::BAD_REQUEST)?;
    let backend = db.read().await;
    Ok(listing(
        ids.into_iter()
            .filter_map(|id| backend.render(collection, id))
            .collect(),
    ))
}

async fn get_record(
    State(db): State<Db>,
    Path((segment, id)): Path<(String, u64)>,
) -> Result<Json<Value>, StatusCode> {
    let collection = collection(&segment)?;
    db.read()
        .await
        .render(collection, id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn create_record(
    State(db): State<Db>,
    Path(segment): Path<String>,
    headers: HeaderMap,
    Json(input): Json<Value>,
) -> Result<Response, StatusCode> {
    let collection = collection(&segment)?;
    let mut backend = db.write().await;
    backend.check_csrf(&headers)?;

    let Value::Object(mut record) = input else {
        return Err(StatusCode::BAD_REQUEST);
    };
    if collection.required().iter().any(|key| !record.contains_key(*key)) {
        return Err(StatusCode::BAD_REQUEST);
    }
    record.remove("resource_uri");
    match collection {
        Collection::TodoItems => {
            let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
            record.insert("date_created".into(), today.into());
            record.entry("completed").or_insert(false.into());
            record.entry("employees").or_insert(json!([]));
        }
        Collection::ScheduleItems => {
            record.entry("employees").or_insert(json!([]));
        }
        Collection::Groups => {
            record.entry("admins").or_insert(json!([]));
        }
        Collection::Employees => {}
    }

    let id = backend.insert(collection, Value::Object(record));
    info!(collection = collection.segment(), id, "record created");
    Ok((StatusCode::CREATED, [(header::LOCATION, collection.path(id))]).into_response())
}

async fn update_record(
    State(db): State<Db>,
    Path((segment, id)): Path<(String, u64)>,
    headers: HeaderMap,
    Json(changes): Json<Record>,
) -> Result<StatusCode, StatusCode> {
    let collection = collection(&segment)?;
    let mut backend = db.write().await;
    backend.check_csrf(&headers)?;
    let record = backend.get_mut(collection, id).ok_or(StatusCode::NOT_FOUND)?;
    for (key, value) in changes {
        if key != "resource_uri" {
            record.insert(key, value);
        }
    }
    Ok(StatusCode::ACCEPTED)
}

async fn delete_record(
    State(db): State<Db>,
    Path((segment, id)): Path<(String, u64)>,
    headers: HeaderMap,
) -> Result<StatusCode, StatusCode> {
    let collection = collection(&segment)?;
    let mut backend = db.write().await;
    backend.check_csrf(&headers)?;
    backend
        .records
        .get_mut(&collection)
        .and_then(|records| records.remove(&id))
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_id_reads_record_segment() {
        assert_eq!(path_id("/api/v1/employees/5/"), Some(5));
        assert_eq!(path_id("/api/v1/employees/"), None);
    }

    #[test]
    fn collections_round_trip_through_segments() {
        for collection in Collection::ALL {
            assert_eq!(Collection::from_segment(collection.segment()), Some(collection));
        }
        assert_eq!(Collection::from_segment("widgets"), None);
    }

    #[test]
    fn employee_render_lists_administrated_groups() {
        let backend = Backend::seeded();
        let employee = backend.render(Collection::Employees, 1).unwrap();
        assert_eq!(
            employee["administrating"],
            json!(["/api/v1/employee-groups/1/", "/api/v1/employee-groups/2/"])
        );
        assert_eq!(employee["user"]["username"], "jfield");
    }

    #[test]
    fn group_render_expands_members() {
        let backend = Backend::seeded();
        let group = backend.render(Collection::Groups, 3).unwrap();
        assert_eq!(group["members_full"][0]["employee"]["user"]["username"], "rkhan");
    }

    #[test]
    fn group_member_filter_follows_item_group() {
        let backend = Backend::seeded();
        let todo = backend.get(Collection::TodoItems, 2).unwrap();
        let by_member = |id: &str| HashMap::from([("group__members".to_string(), id.to_string())]);
        assert!(backend.matches(todo, &by_member("3")));
        assert!(!backend.matches(todo, &by_member("2")));
    }

    #[test]
    fn ids_are_assigned_per_collection() {
        let mut backend = Backend::default();
        assert_eq!(backend.insert(Collection::Groups, json!({"name": "a"})), 1);
        assert_eq!(backend.insert(Collection::Groups, json!({"name": "b"})), 2);
        assert_eq!(backend.insert(Collection::TodoItems, json!({"title": "c"})), 1);
        assert_eq!(
            backend.get(Collection::Groups, 2).unwrap()["resource_uri"],
            "/api/v1/employee-groups/2/"
        );
    }
}
