//! Session lifecycle through the dispatcher: one upstream per client
//! connection, bounded FIFO eviction, and cleanup on close.

mod common;

use common::{FakeClient, FakeConnector, USERS_DN};
use ldap_proxy::{
    ClientConnection, DirectoryHandler, RequestDispatcher, ResultCode, SearchRequest,
    SearchScope, SessionStore,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn setup(max_sessions: usize) -> (Arc<FakeConnector>, Arc<SessionStore>, RequestDispatcher) {
    let connector = Arc::new(FakeConnector::default());
    let store = Arc::new(SessionStore::new(connector.clone(), max_sessions));
    let dispatcher = RequestDispatcher::new(store.clone(), USERS_DN);
    (connector, store, dispatcher)
}

fn group_search(filter: &str) -> SearchRequest {
    SearchRequest {
        base_dn: "ou=groups,dc=example,dc=com".to_string(),
        scope: SearchScope::BaseObject,
        filter: filter.to_string(),
        attributes: vec!["cn".to_string()],
    }
}

#[tokio::test]
async fn test_bind_then_search_reuses_one_upstream() {
    let (connector, store, dispatcher) = setup(10);
    let client = FakeClient::new(40001);

    dispatcher
        .bind("cn=alice,ou=users,dc=example,dc=com", "secret", &client)
        .await
        .unwrap();
    let result = dispatcher
        .search(group_search("(&(objectClass=group)(sudoUser=alice))"), &client)
        .await
        .unwrap();

    assert_eq!(result.result_code, ResultCode::Success);
    assert_eq!(result.entries.len(), 1);
    assert_eq!(connector.dials(), 1);
    assert_eq!(store.len(), 1);

    let upstream = connector.handle(0);
    assert_eq!(upstream.binds.lock().len(), 1);
    let searches = upstream.searches.lock();
    assert_eq!(
        searches[0].filter,
        "(&(objectClass=group)(member=cn=alice,ou=users,dc=example,dc=com))"
    );
    assert_eq!(searches[0].scope, SearchScope::WholeSubtree);
}

#[tokio::test]
async fn test_close_removes_session_and_closes_upstream() {
    let (connector, store, dispatcher) = setup(10);
    let client = FakeClient::new(40002);

    dispatcher.bind("cn=bob", "pw", &client).await.unwrap();
    assert!(store.contains(&client.id()));

    dispatcher.close(&client).await;

    assert!(client.is_closed());
    assert!(store.is_empty());
    assert!(connector.handle(0).is_closed_flag());
}

#[tokio::test]
async fn test_close_without_session_is_harmless() {
    let (connector, store, dispatcher) = setup(10);
    let client = FakeClient::new(40003);

    dispatcher.close(&client).await;
    dispatcher.close(&client).await;

    assert!(client.is_closed());
    assert!(store.is_empty());
    assert_eq!(connector.dials(), 0);
}

#[tokio::test]
async fn test_oldest_client_is_evicted_when_full() {
    let (connector, store, dispatcher) = setup(2);
    let clients: Vec<FakeClient> = (0..3).map(|i| FakeClient::new(41000 + i)).collect();

    for client in &clients {
        dispatcher.bind("cn=x", "pw", client).await.unwrap();
    }

    assert_eq!(store.len(), 2);
    assert_eq!(store.evictions(), 1);
    assert!(!store.contains(&clients[0].id()));
    assert_eq!(store.ids_in_order(), vec![clients[1].id(), clients[2].id()]);
    assert!(connector.handle(0).is_closed_flag());
    assert!(!connector.handle(1).is_closed_flag());

    // The evicted client comes back with a fresh upstream
    dispatcher.bind("cn=x", "pw", &clients[0]).await.unwrap();
    assert_eq!(connector.dials(), 4);
    assert_eq!(store.ids_in_order(), vec![clients[2].id(), clients[0].id()]);
}

#[tokio::test]
async fn test_use_does_not_refresh_position() {
    let (_connector, store, dispatcher) = setup(2);
    let first = FakeClient::new(42001);
    let second = FakeClient::new(42002);
    let third = FakeClient::new(42003);

    dispatcher.bind("cn=a", "pw", &first).await.unwrap();
    dispatcher.bind("cn=b", "pw", &second).await.unwrap();
    // Activity on the oldest session does not protect it
    dispatcher
        .search(group_search("(cn=admins)"), &first)
        .await
        .unwrap();
    dispatcher.bind("cn=c", "pw", &third).await.unwrap();

    assert!(!store.contains(&first.id()));
    assert!(store.contains(&second.id()));
    assert!(store.contains(&third.id()));
}

#[tokio::test]
async fn test_dial_failure_reports_operations_error() {
    let (connector, store, dispatcher) = setup(10);
    connector.fail.store(true, Ordering::SeqCst);
    let client = FakeClient::new(43001);

    let err = dispatcher.bind("cn=a", "pw", &client).await.unwrap_err();
    assert_eq!(err.result_code(), ResultCode::OperationsError);

    let result = dispatcher
        .search(group_search("(cn=admins)"), &client)
        .await
        .unwrap();
    assert_eq!(result.result_code, ResultCode::OperationsError);
    assert!(result.entries.is_empty());
    assert!(store.is_empty());

    // Recovery once the upstream is reachable again
    connector.fail.store(false, Ordering::SeqCst);
    dispatcher.bind("cn=a", "pw", &client).await.unwrap();
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_rejected_bind_keeps_session() {
    let connector = Arc::new(FakeConnector::rejecting_binds());
    let store = Arc::new(SessionStore::new(connector.clone(), 10));
    let dispatcher = RequestDispatcher::new(store.clone(), USERS_DN);
    let client = FakeClient::new(44001);

    let err = dispatcher.bind("cn=a", "wrong", &client).await.unwrap_err();
    assert_eq!(err.result_code(), ResultCode::OperationsError);
    assert_eq!(store.len(), 1);

    // A retry goes to the same upstream connection
    let _ = dispatcher.bind("cn=a", "wrong", &client).await;
    assert_eq!(connector.dials(), 1);
    assert_eq!(connector.handle(0).binds.lock().len(), 2);
}

#[tokio::test]
async fn test_many_clients_never_exceed_capacity() {
    let (connector, store, dispatcher) = setup(4);
    let dispatcher = Arc::new(dispatcher);

    let tasks: Vec<_> = (0..32u16)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let client = FakeClient::new(45000 + i);
                dispatcher.bind("cn=x", "pw", &client).await.unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(store.len(), 4);
    assert_eq!(connector.dials(), 32);
    assert_eq!(store.evictions(), 28);
    let open = connector
        .handles()
        .iter()
        .filter(|u| !u.is_closed_flag())
        .count();
    assert_eq!(open, 4);
}
