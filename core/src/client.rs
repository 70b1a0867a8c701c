//! High-level operations against the Bizzorg backend.
//!
//! # Design
//! `BizzorgClient` holds only the site roots and a shared transport. Each
//! operation builds one `ApiCall`, sends it, checks the status it expects,
//! and hands the envelope to the marshaller. Unlike the dispatcher, these
//! operations do classify statuses: an unexpected status becomes
//! `ServerError`, or `InvalidOrMissingCsrfToken` for a 403 on a call that
//! went out without a token.
//!
//! Identity comes from an explicit `Session`, never from global state.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::info;
use url::Url;

use crate::config::ClientConfig;
use crate::dispatch::ApiCall;
use crate::envelope::ResponseEnvelope;
use crate::error::ApiError;
use crate::http::HttpMethod;
use crate::marshal::{marshal_list, marshal_one, ApiRecord};
use crate::models::{Draft, Employee, EmployeeGroup, GroupScoped, ScheduleItem, ToDoListItem};
use crate::multipart::UploadablePart;
use crate::resource::{Endpoint, ResourcePath, SiteConfig};
use crate::session::Session;
use crate::transport::{ReqwestTransport, Transport};

const LOGIN_PATH: &str = "groups/login/";
const LOGOUT_PATH: &str = "groups/logout/";
const PROFILE_PICTURE_PATH: &str = "groups/update_profile_picture/";

const OK: &[u16] = &[200];
const CREATED: &[u16] = &[201];
const UPDATED: &[u16] = &[200, 202, 204];
const DELETED: &[u16] = &[204];
const UPLOADED: &[u16] = &[200, 201];

#[derive(Clone)]
pub struct BizzorgClient {
    site: SiteConfig,
    transport: Arc<dyn Transport>,
}

impl BizzorgClient {
    pub fn new(site: SiteConfig, transport: Arc<dyn Transport>) -> Self {
        Self { site, transport }
    }

    /// A client backed by a fresh `ReqwestTransport` session.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let site = SiteConfig::new(&config.site_root)?;
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::new(site, Arc::new(transport)))
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Send `call` and check its status against `expected`.
    async fn execute<'a>(&self, call: &'a mut ApiCall, expected: &[u16]) -> Result<&'a ResponseEnvelope, ApiError> {
        let status = {
            let envelope = call.send(self.transport.as_ref()).await;
            envelope.checked()?.0.status
        };
        if !expected.contains(&status) {
            return Err(status_error(status, call.csrf_sent()));
        }
        call.response().ok_or(ApiError::NoResponseFromServer)
    }

    // -----------------------------------------------------------------------
    // Authentication
    // -----------------------------------------------------------------------

    /// Verify credentials and store the returned employee in `session`.
    pub async fn login(&self, session: &mut Session, username: &str, password: &str) -> Result<Employee, ApiError> {
        session.ensure_logged_out()?;
        let mut call = ApiCall::site(&self.site, LOGIN_PATH, HttpMethod::Post)?;
        call.set_form(&[("username", username), ("password", password)])?;

        let employee: Employee = marshal_one(self.execute(&mut call, OK).await?)?;
        info!(user = %employee.resource_uri, "logged in");
        session.set_user(employee.clone());
        Ok(employee)
    }

    /// End the server session and forget the logged-in user.
    pub async fn logout(&self, session: &mut Session) -> Result<(), ApiError> {
        let mut call = ApiCall::site(&self.site, LOGOUT_PATH, HttpMethod::Post)?;
        self.execute(&mut call, OK).await?;
        session.clear();
        info!("logged out");
        Ok(())
    }

    /// Re-fetch the logged-in user and replace the stored record.
    pub async fn refresh_logged_in_user(&self, session: &mut Session) -> Result<Employee, ApiError> {
        let path = session.require_user()?.resource_uri.clone();
        let updated: Employee = self.get_object(&path).await?;
        session.set_user(updated.clone());
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetch one record by its resource path.
    pub async fn get_object<T: ApiRecord>(&self, path: &ResourcePath) -> Result<T, ApiError> {
        let mut call = ApiCall::new(&self.site, Endpoint::resource(&self.site, path)?, HttpMethod::Get);
        marshal_one(self.execute(&mut call, OK).await?)
    }

    /// Fetch raw bytes, e.g. a profile picture.
    pub async fn get_bytes(&self, path: &ResourcePath) -> Result<Bytes, ApiError> {
        let mut call = ApiCall::new(&self.site, Endpoint::resource(&self.site, path)?, HttpMethod::Get);
        let envelope = self.execute(&mut call, OK).await?;
        envelope.body().cloned().ok_or(ApiError::NoDataRetrievedFromServer)
    }

    /// Fetch the group a to-do or schedule item belongs to.
    pub async fn resolve_group<I: GroupScoped>(&self, item: &I) -> Result<EmployeeGroup, ApiError> {
        self.get_object(item.group()).await
    }

    /// The employee's profile picture, or `None` when they have none.
    pub async fn profile_picture(&self, employee: &Employee) -> Result<Option<Bytes>, ApiError> {
        match &employee.profile_picture {
            Some(path) => self.get_bytes(path).await.map(Some),
            None => Ok(None),
        }
    }

    /// List a record collection. `suffix` is appended to the collection
    /// path, e.g. `?group=3` or `set/1;2/`.
    pub async fn list<T: ApiRecord>(&self, suffix: &str) -> Result<Vec<T>, ApiError> {
        let relative = format!("{}{suffix}", T::COLLECTION);
        let mut call = ApiCall::api(&self.site, &relative, HttpMethod::Get)?;
        marshal_list(self.execute(&mut call, OK).await?)
    }

    pub async fn employees(&self) -> Result<Vec<Employee>, ApiError> {
        self.list("").await
    }

    /// Groups the logged-in user is a member of.
    pub async fn groups_for_user(&self, session: &Session) -> Result<Vec<EmployeeGroup>, ApiError> {
        let id = record_id(session.require_user()?)?;
        self.list(&format!("?members={id}")).await
    }

    pub async fn subgroups(&self, parent: &EmployeeGroup) -> Result<Vec<EmployeeGroup>, ApiError> {
        self.list(&format!("?parent_group={}", record_id(parent)?)).await
    }

    /// Fetch several groups in one request.
    pub async fn groups_by_ids(&self, ids: &[u64]) -> Result<Vec<EmployeeGroup>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(";");
        self.list(&format!("set/{joined}/")).await
    }

    /// Groups the logged-in user administrates.
    pub async fn administrated_groups(&self, session: &Session) -> Result<Vec<EmployeeGroup>, ApiError> {
        let ids = session.require_user()?.administrated_group_ids();
        self.groups_by_ids(&ids).await
    }

    pub async fn todo_items_for_user(&self, session: &Session) -> Result<Vec<ToDoListItem>, ApiError> {
        let id = record_id(session.require_user()?)?;
        self.list(&format!("?group__members={id}")).await
    }

    pub async fn todo_items_for_group(&self, group: &EmployeeGroup) -> Result<Vec<ToDoListItem>, ApiError> {
        self.list(&format!("?group={}", record_id(group)?)).await
    }

    pub async fn schedule_items_for_user(&self, session: &Session) -> Result<Vec<ScheduleItem>, ApiError> {
        let id = record_id(session.require_user()?)?;
        self.list(&format!("?group__members={id}")).await
    }

    pub async fn schedule_items_for_group(&self, group: &EmployeeGroup) -> Result<Vec<ScheduleItem>, ApiError> {
        self.list(&format!("?group={}", record_id(group)?)).await
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Create a record. Returns the new record's path when the server sends
    /// a `Location` header.
    pub async fn create<D: Draft>(&self, draft: &D) -> Result<Option<ResourcePath>, ApiError> {
        let payload = match serde_json::to_value(draft) {
            Ok(Value::Object(object)) => object,
            Ok(_) => return Err(ApiError::SerializationError("draft is not an object".to_string())),
            Err(e) => return Err(ApiError::SerializationError(e.to_string())),
        };
        let mut call = ApiCall::api(&self.site, D::Record::COLLECTION, HttpMethod::Post)?;
        call.set_json(&payload)?;

        let envelope = self.execute(&mut call, CREATED).await?;
        Ok(envelope.head().and_then(|head| location_path(&head.headers)))
    }

    /// Apply `changes` to `record` and return the whole record as the
    /// server now holds it.
    pub async fn update<T: ApiRecord>(&self, record: &T, changes: &Map<String, Value>) -> Result<T, ApiError> {
        let endpoint = Endpoint::resource(&self.site, record.resource_uri())?;
        let mut call = ApiCall::new(&self.site, endpoint, HttpMethod::Patch);
        call.set_json(changes)?;
        self.execute(&mut call, UPDATED).await?;
        self.get_object(record.resource_uri()).await
    }

    /// Flip the completed flag of a to-do item.
    pub async fn toggle_completed(&self, item: &ToDoListItem) -> Result<ToDoListItem, ApiError> {
        let mut changes = Map::new();
        changes.insert("completed".to_string(), Value::Bool(!item.completed));
        self.update(item, &changes).await
    }

    pub async fn delete<T: ApiRecord>(&self, record: &T) -> Result<(), ApiError> {
        let endpoint = Endpoint::resource(&self.site, record.resource_uri())?;
        let mut call = ApiCall::new(&self.site, endpoint, HttpMethod::Delete);
        self.execute(&mut call, DELETED).await?;
        Ok(())
    }

    /// Upload a JPEG as the employee's profile picture. Returns the path of
    /// the stored picture.
    pub async fn update_profile_picture(&self, employee: &Employee, jpeg: Vec<u8>) -> Result<ResourcePath, ApiError> {
        let id = record_id(employee)?;
        let mut call = ApiCall::site(&self.site, PROFILE_PICTURE_PATH, HttpMethod::Post)?;
        call.set_files(&[
            UploadablePart::file("new_profile_picture", "image.jpg", "image/jpeg", jpeg),
            UploadablePart::text("user", &id.to_string()),
        ]);

        let text = self.execute(&mut call, UPLOADED).await?.text()?;
        ResourcePath::parse(text.trim())
            .ok_or_else(|| ApiError::DataConversionFailed(format!("picture path {text:?}")))
    }
}

fn record_id<T: ApiRecord>(record: &T) -> Result<u64, ApiError> {
    record
        .id()
        .ok_or_else(|| ApiError::DataConversionFailed(format!("{} has no id", T::KIND)))
}

/// Map an unexpected status to an error.
fn status_error(status: u16, csrf_sent: bool) -> ApiError {
    if status == 403 && !csrf_sent {
        return ApiError::InvalidOrMissingCsrfToken;
    }
    ApiError::ServerError { status }
}

/// The path part of a `Location` header, absolute or relative.
fn location_path(headers: &[(String, String)]) -> Option<ResourcePath> {
    let (_, location) = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("location"))?;
    match Url::parse(location) {
        Ok(url) => ResourcePath::parse(url.path()),
        Err(_) => ResourcePath::parse(location),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::http::{HttpRequest, ResponseHead, TransportResult};
    use crate::models::{NewToDoItem, Priority};
    use crate::session::{MemorySessionStore, SessionStore, LOGGED_IN_USER_KEY};

    /// Replies from a queue and records each request.
    struct ScriptedTransport {
        replies: Mutex<Vec<TransportResult>>,
        seen: Mutex<Vec<HttpRequest>>,
        csrf: Option<String>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<TransportResult>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
                csrf: None,
            })
        }

        fn with_csrf(replies: Vec<TransportResult>, token: &str) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
                csrf: Some(token.to_string()),
            })
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: HttpRequest) -> TransportResult {
            self.seen.lock().unwrap().push(request);
            self.replies.lock().unwrap().pop().unwrap_or_default()
        }

        fn cookie(&self, _site: &Url, _name: &str) -> Option<String> {
            self.csrf.clone()
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> BizzorgClient {
        BizzorgClient::new(SiteConfig::new("http://localhost:8000").unwrap(), transport)
    }

    fn employee_json() -> Value {
        json!({
            "resource_uri": "/api/v1/employees/5/",
            "job_position": "Engineer",
            "administrating": ["/api/v1/employee-groups/2/", "/api/v1/employee-groups/4/"],
            "user": {
                "username": "jfield",
                "first_name": "Jordan",
                "surname": "Field",
                "email": "j@x.com",
                "is_staff": true
            }
        })
    }

    fn empty_session() -> Session {
        Session::load(Box::new(MemorySessionStore::new()))
    }

    fn ok(body: Value) -> TransportResult {
        TransportResult::response(200, body.to_string())
    }

    #[tokio::test]
    async fn login_posts_form_and_stores_employee() {
        let transport = ScriptedTransport::new(vec![ok(employee_json())]);
        let mut session = empty_session();

        let employee = client(transport.clone())
            .login(&mut session, "jfield", "hunter2")
            .await
            .unwrap();

        assert!(employee.is_staff);
        assert_eq!(session.user(), Some(&employee));
        let request = &transport.requests()[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://localhost:8000/groups/login/");
        assert_eq!(request.header("Content-Type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(request.body.as_deref(), Some(&b"username=jfield&password=hunter2"[..]));
    }

    #[tokio::test]
    async fn login_persists_employee_and_logout_removes_it() {
        let transport = ScriptedTransport::new(vec![ok(employee_json()), TransportResult::response(200, "")]);
        let store = Arc::new(MemorySessionStore::new());
        let mut session = Session::load(Box::new(Arc::clone(&store)));
        let client = client(transport);

        let employee = client.login(&mut session, "jfield", "hunter2").await.unwrap();
        assert_eq!(store.load(LOGGED_IN_USER_KEY), Some(Value::Object(employee.to_json())));

        client.logout(&mut session).await.unwrap();
        assert!(store.load(LOGGED_IN_USER_KEY).is_none());
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn login_with_bad_credentials_is_a_server_error() {
        let transport = ScriptedTransport::new(vec![TransportResult::response(401, "")]);
        let mut session = empty_session();
        let err = client(transport).login(&mut session, "jfield", "wrong").await.unwrap_err();
        assert_eq!(err, ApiError::ServerError { status: 401 });
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn second_login_is_rejected_without_network() {
        let transport = ScriptedTransport::new(vec![ok(employee_json())]);
        let mut session = empty_session();
        let client = client(transport.clone());
        client.login(&mut session, "jfield", "pw").await.unwrap();

        let err = client.login(&mut session, "jfield", "pw").await.unwrap_err();
        assert!(matches!(err, ApiError::UserAlreadyLoggedIn { .. }));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn listings_need_a_logged_in_user() {
        let transport = ScriptedTransport::new(Vec::new());
        let err = client(transport.clone())
            .todo_items_for_user(&empty_session())
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::NoLoggedInUser);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn administrated_groups_use_set_lookup() {
        let transport = ScriptedTransport::new(vec![ok(employee_json()), ok(json!({"objects": []}))]);
        let client = client(transport.clone());
        let mut session = empty_session();
        client.login(&mut session, "jfield", "pw").await.unwrap();

        let groups = client.administrated_groups(&session).await.unwrap();
        assert!(groups.is_empty());
        assert_eq!(
            transport.requests()[1].url,
            "http://localhost:8000/api/v1/employee-groups/set/2;4/"
        );
    }

    #[tokio::test]
    async fn unexpected_forbidden_without_token_is_a_csrf_error() {
        let transport = ScriptedTransport::new(vec![TransportResult::response(403, "CSRF failed")]);
        let draft = NewToDoItem {
            group: ResourcePath::for_record("employee-groups", 2),
            title: "Order parts".to_string(),
            description: None,
            priority: Priority::Regular,
            deadline_date: None,
            employees: Vec::new(),
        };
        let err = client(transport).create(&draft).await.unwrap_err();
        assert_eq!(err, ApiError::InvalidOrMissingCsrfToken);
    }

    #[tokio::test]
    async fn create_returns_location_path() {
        let created = TransportResult {
            head: Some(ResponseHead {
                status: 201,
                headers: vec![(
                    "location".to_string(),
                    "http://localhost:8000/api/v1/todolist-items/9/".to_string(),
                )],
            }),
            ..TransportResult::response(201, "")
        };
        let transport = ScriptedTransport::with_csrf(vec![created], "t0k3n");
        let draft = NewToDoItem {
            group: ResourcePath::for_record("employee-groups", 2),
            title: "Order parts".to_string(),
            description: None,
            priority: Priority::Severe,
            deadline_date: None,
            employees: Vec::new(),
        };

        let path = client(transport.clone()).create(&draft).await.unwrap();
        assert_eq!(path, Some(ResourcePath::for_record("todolist-items", 9)));
        let request = &transport.requests()[0];
        assert_eq!(request.header("X-CSRFToken"), Some("t0k3n"));
        let body: Value = serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["priority"], "sev");
    }

    #[tokio::test]
    async fn toggle_completed_patches_then_refetches() {
        let item = json!({
            "resource_uri": "/api/v1/todolist-items/12/",
            "group": "/api/v1/employee-groups/2/",
            "title": "Order parts",
            "priority": "reg",
            "completed": false,
            "date_created": "2016-07-13"
        });
        let mut updated = item.clone();
        updated["completed"] = json!(true);
        let transport = ScriptedTransport::with_csrf(
            vec![TransportResult::response(202, ""), ok(updated)],
            "t0k3n",
        );
        let original = ToDoListItem::from_json(item.as_object().unwrap()).unwrap();

        let refreshed = client(transport.clone()).toggle_completed(&original).await.unwrap();
        assert!(refreshed.completed);

        let requests = transport.requests();
        assert_eq!(requests[0].method, HttpMethod::Patch);
        assert_eq!(requests[0].body.as_deref(), Some(&br#"{"completed":true}"#[..]));
        assert_eq!(requests[1].method, HttpMethod::Get);
        assert_eq!(requests[1].url, "http://localhost:8000/api/v1/todolist-items/12/");
    }

    #[tokio::test]
    async fn profile_picture_upload_is_multipart() {
        let transport = ScriptedTransport::with_csrf(
            vec![TransportResult::response(200, "/media/profile_pictures/5.jpg")],
            "t0k3n",
        );
        let employee = Employee::from_json(employee_json().as_object().unwrap()).unwrap();

        let path = client(transport.clone())
            .update_profile_picture(&employee, vec![0xff, 0xd8, 0xff])
            .await
            .unwrap();
        assert_eq!(path.as_str(), "/media/profile_pictures/5.jpg");

        let request = &transport.requests()[0];
        assert_eq!(request.url, "http://localhost:8000/groups/update_profile_picture/");
        assert!(request
            .header("Content-Type")
            .unwrap()
            .starts_with("multipart/form-data; boundary=----"));
        let body = String::from_utf8_lossy(request.body.as_deref().unwrap()).into_owned();
        assert!(body.contains("name=\"new_profile_picture\"; filename=\"image.jpg\"\r\nContent-Type: image/jpeg"));
        assert!(body.contains("name=\"user\"\r\n\r\n5\r\n"));
    }

    #[tokio::test]
    async fn no_response_surfaces_as_error() {
        let transport = ScriptedTransport::new(vec![TransportResult::failed(ApiError::Transport(
            "connection refused".to_string(),
        ))]);
        let err = client(transport).employees().await.unwrap_err();
        assert_eq!(err, ApiError::NoResponseFromServer);
    }

    #[test]
    fn location_header_accepts_relative_paths() {
        let headers = vec![("Location".to_string(), "/api/v1/employee-groups/8/".to_string())];
        assert_eq!(location_path(&headers), Some(ResourcePath::for_record("employee-groups", 8)));
        assert_eq!(location_path(&[]), None);
    }
}
