use crate::*;

use trickle_ctl::AuthOutcome;

/// Many simultaneous AUTHs for one user: exactly one wins.
#[tokio::test]
async fn test_concurrent_auth_admits_one() {
    let (server, _) = spawn_server().await;
    let addr = server.local_addr();

    let mut clients = Vec::new();
    for _ in 0..16 {
        clients.push(RawClient::connect(addr).await.unwrap());
    }

    let mut tasks = Vec::new();
    for (i, client) in clients.into_iter().enumerate() {
        tasks.push(tokio::spawn(async move {
            client
                .request(&format!("AUTH alice alice-pw {}", 7000 + i))
                .await
                .unwrap()
        }));
    }

    let mut ok = 0;
    let mut already = 0;
    for t in tasks {
        match t.await.unwrap().as_str() {
            "OK" => ok += 1,
            "User already active" => already += 1,
            other => panic!("unexpected reply: {other}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(already, 15);
    assert_eq!(server.state().registry.len().await, 1);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_bad_credentials_leave_no_session() {
    let (server, journal) = spawn_server().await;
    let client = RawClient::connect(server.local_addr()).await.unwrap();

    assert_eq!(
        client.request("AUTH alice wrong 7000").await.unwrap(),
        "Authentication failed"
    );
    assert_eq!(
        client.request("AUTH mallory alice-pw 7000").await.unwrap(),
        "Authentication failed"
    );
    assert!(server.state().registry.is_empty().await);

    let lines: Vec<String> = journal.entries().iter().map(ToString::to_string).collect();
    let port = client.local_addr().port();
    assert!(lines.contains(&format!("{port}: Received AUTH from alice")));
    assert!(lines.contains(&format!("{port}: Sent ERR to alice")));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_peer_sees_rejection_text() {
    let (server, _) = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();

    let _alice = logged_in_peer(server.local_addr(), dir.path(), "alice", Duration::from_secs(1)).await;

    let mut imposter = spawn_peer(server.local_addr(), dir.path(), Duration::from_secs(1)).await;
    assert_eq!(
        imposter.authenticate("alice", "alice-pw").await.unwrap(),
        AuthOutcome::Rejected("User already active".into())
    );
    assert_eq!(
        imposter.authenticate("bob", "nope").await.unwrap(),
        AuthOutcome::Rejected("Authentication failed".into())
    );
    assert_eq!(imposter.username(), None);
    assert!(imposter.list_active_peers().await.is_err());

    server.shutdown().await.unwrap();
}

/// LAP replies: none, exactly one, several.
#[tokio::test]
async fn test_list_active_peers_pluralization() {
    let (server, _) = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let addr = server.local_addr();
    let hb = Duration::from_secs(1);

    let alice = logged_in_peer(addr, dir.path(), "alice", hb).await;
    assert_eq!(alice.list_active_peers().await.unwrap(), "No active peers");

    let _bob = logged_in_peer(addr, dir.path(), "bob", hb).await;
    assert_eq!(alice.list_active_peers().await.unwrap(), "1 active peer:\nbob");

    let _carol = logged_in_peer(addr, dir.path(), "carol", hb).await;
    assert_eq!(
        alice.list_active_peers().await.unwrap(),
        "2 active peers:\nbob\ncarol"
    );

    server.shutdown().await.unwrap();
}

/// XIT ends the session at once and frees the username.
#[tokio::test]
async fn test_exit_frees_username() {
    let (server, _) = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let addr = server.local_addr();
    let hb = Duration::from_secs(1);

    let alice = logged_in_peer(addr, dir.path(), "alice", hb).await;
    let bob = logged_in_peer(addr, dir.path(), "bob", hb).await;
    assert_eq!(alice.exit().await.unwrap(), "Goodbye");

    assert_eq!(bob.list_active_peers().await.unwrap(), "No active peers");
    let _again = logged_in_peer(addr, dir.path(), "alice", hb).await;

    server.shutdown().await.unwrap();
}
