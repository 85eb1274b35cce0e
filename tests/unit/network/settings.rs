//! Validation performed by `start()`

use lanchat::network::{ConnectionError, ConnectionManager, ConnectionSettings, Role};

#[tokio::test]
async fn test_missing_port_rejected() {
    let mut manager = ConnectionManager::new(ConnectionSettings {
        role: Some(Role::Acceptor),
        ..ConnectionSettings::default()
    });
    let err = manager.start().unwrap_err();
    assert!(matches!(err, ConnectionError::Configuration(_)));
    assert!(err.to_string().contains("port"));
}

#[tokio::test]
async fn test_initiator_without_address_rejected() {
    let mut manager = ConnectionManager::new(ConnectionSettings {
        role: Some(Role::Initiator),
        port: Some(50000),
        ..ConnectionSettings::default()
    });
    assert!(matches!(
        manager.start(),
        Err(ConnectionError::Configuration(_))
    ));
    assert!(!manager.handler_has_exited());
}

#[tokio::test]
async fn test_acceptor_needs_no_address() {
    let mut manager = ConnectionManager::new(
        ConnectionSettings::acceptor(0).with_bind_address("127.0.0.1"),
    );
    manager.start().expect("acceptor without address should start");
    assert_eq!(manager.role(), Some(Role::Acceptor));

    manager.request_exit();
    manager.wait_for_exit().await;
    assert!(manager.handler_has_exited());
}
