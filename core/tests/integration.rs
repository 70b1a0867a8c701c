//! End-to-end session against the live mock backend.
//!
//! # Design
//! Starts the mock server on a random port and drives every client
//! operation through `ReqwestTransport`, so the cookie jar, CSRF header,
//! form and multipart encoding and the marshallers all run against real
//! HTTP.

use bizzorg_core::{
    marshal_list, ApiCall, ApiError, BizzorgClient, CallState, ClientConfig, Employee, HttpMethod,
    MemorySessionStore, NewToDoItem, Priority, ResourcePath, Session, ToDoListItem,
};
use chrono::NaiveDate;

async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));
    format!("http://{addr}")
}

async fn connect() -> BizzorgClient {
    let config = ClientConfig {
        site_root: start_server().await,
        ..ClientConfig::default()
    };
    BizzorgClient::from_config(&config).unwrap()
}

fn new_session() -> Session {
    Session::load(Box::new(MemorySessionStore::new()))
}

fn draft(title: &str) -> NewToDoItem {
    NewToDoItem {
        group: ResourcePath::for_record("employee-groups", 2),
        title: title.to_string(),
        description: Some("from the integration test".to_string()),
        priority: Priority::Significant,
        deadline_date: NaiveDate::from_ymd_opt(2016, 12, 1),
        employees: vec![ResourcePath::for_record("employees", 2)],
    }
}

#[tokio::test]
async fn anonymous_reads_work_but_writes_lack_csrf() {
    let client = connect().await;

    let employees = client.employees().await.unwrap();
    assert_eq!(employees.len(), 3);
    assert_eq!(employees[0].full_name(), "Jordan Field");

    let err = client.create(&draft("too early")).await.unwrap_err();
    assert_eq!(err, ApiError::InvalidOrMissingCsrfToken);
}

#[tokio::test]
async fn bad_credentials_leave_session_empty() {
    let client = connect().await;
    let mut session = new_session();

    let err = client.login(&mut session, "jfield", "wrong").await.unwrap_err();
    assert_eq!(err, ApiError::ServerError { status: 401 });
    assert!(session.user().is_none());
}

#[tokio::test]
async fn full_session_lifecycle() {
    let client = connect().await;
    let mut session = new_session();

    // Step 1: log in.
    let me = client.login(&mut session, "jfield", "password").await.unwrap();
    assert_eq!(me.username, "jfield");
    assert_eq!(me.administrated_group_ids(), [1, 2]);
    assert_eq!(session.user(), Some(&me));

    // Step 2: group listings.
    let mine = client.groups_for_user(&session).await.unwrap();
    assert_eq!(mine.len(), 2);
    let admin = client.administrated_groups(&session).await.unwrap();
    let titles: Vec<_> = admin.iter().map(|g| g.title()).collect();
    assert_eq!(titles, ["Head Office", "Field Operations"]);
    let children = client.subgroups(&admin[0]).await.unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[1].member_profiles[0].username, "rkhan");

    // Step 3: work listings and lazy group resolution.
    let todos = client.todo_items_for_user(&session).await.unwrap();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].priority, Priority::Urgent);
    let group = client.resolve_group(&todos[0]).await.unwrap();
    assert_eq!(group.name, "field operations");

    let schedule = client.schedule_items_for_user(&session).await.unwrap();
    assert_eq!(schedule.len(), 2);
    let group_schedule = client.schedule_items_for_group(&group).await.unwrap();
    assert_eq!(group_schedule.len(), 1);
    assert_eq!(group_schedule[0].title, "site visit");

    // Step 4: create, toggle and delete a to-do item.
    let path = client.create(&draft("Order toner")).await.unwrap().unwrap();
    let created: ToDoListItem = client.get_object(&path).await.unwrap();
    assert_eq!(created.title, "Order toner");
    assert!(!created.completed);
    assert_eq!(created.deadline_date, NaiveDate::from_ymd_opt(2016, 12, 1));

    let toggled = client.toggle_completed(&created).await.unwrap();
    assert!(toggled.completed);
    assert_eq!(client.todo_items_for_group(&group).await.unwrap().len(), 2);

    client.delete(&toggled).await.unwrap();
    let err = client.get_object::<ToDoListItem>(&path).await.unwrap_err();
    assert_eq!(err, ApiError::ServerError { status: 404 });

    // Step 5: profile picture.
    let jpeg = vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];
    let picture = client.update_profile_picture(&me, jpeg.clone()).await.unwrap();
    assert_eq!(picture.as_str(), "/media/profile_pictures/1.jpg");
    let refreshed = client.refresh_logged_in_user(&mut session).await.unwrap();
    assert_eq!(refreshed.profile_picture.as_ref(), Some(&picture));
    let fetched = client.profile_picture(&refreshed).await.unwrap().unwrap();
    assert_eq!(fetched.as_ref(), jpeg.as_slice());

    // Step 6: log out. The revoked token no longer passes.
    client.logout(&mut session).await.unwrap();
    assert!(session.user().is_none());
    let err = client.logout(&mut session).await.unwrap_err();
    assert_eq!(err, ApiError::ServerError { status: 403 });
}

#[tokio::test]
async fn send_to_server_delivers_completed_call() {
    let client = connect().await;
    let call = ApiCall::api(client.site(), "employees/", HttpMethod::Get).unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    call.send_to_server(client.transport(), move |call| {
        let employees = call.response().map(marshal_list::<Employee>);
        tx.send((call.state(), employees)).unwrap();
    })
    .await
    .unwrap();

    let (state, employees) = rx.recv().await.unwrap();
    assert_eq!(state, CallState::Completed);
    assert_eq!(employees.unwrap().unwrap().len(), 3);
}

#[tokio::test]
async fn unreachable_server_is_no_response() {
    let config = ClientConfig {
        site_root: "http://127.0.0.1:1".to_string(),
        connect_timeout_secs: 2,
        ..ClientConfig::default()
    };
    let client = BizzorgClient::from_config(&config).unwrap();
    let err = client.employees().await.unwrap_err();
    assert_eq!(err, ApiError::NoResponseFromServer);
}
