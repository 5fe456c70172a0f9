use crate::*;

#[tokio::test]
async fn test_publish_is_idempotent_and_listed() {
    let (server, _) = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let alice = logged_in_peer(server.local_addr(), dir.path(), "alice", Duration::from_secs(1)).await;

    assert_eq!(alice.list_published().await.unwrap(), "No files published");
    assert_eq!(
        alice.publish("a.txt").await.unwrap(),
        "File a.txt published successfully"
    );
    assert_eq!(
        alice.publish("a.txt").await.unwrap(),
        "File a.txt published successfully"
    );
    assert_eq!(alice.list_published().await.unwrap(), "1 file published:\na.txt");

    alice.publish("b.txt").await.unwrap();
    assert_eq!(
        alice.list_published().await.unwrap(),
        "2 files published:\na.txt\nb.txt"
    );
    assert_eq!(server.state().directory.len().await, 2);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unpublish_only_removes_what_exists() {
    let (server, _) = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let addr = server.local_addr();
    let hb = Duration::from_secs(1);
    let alice = logged_in_peer(addr, dir.path(), "alice", hb).await;
    let bob = logged_in_peer(addr, dir.path(), "bob", hb).await;

    alice.publish("a.txt").await.unwrap();
    alice.publish("b.txt").await.unwrap();

    assert_eq!(alice.unpublish("c.txt").await.unwrap(), "File unpublication failed");
    assert_eq!(bob.unpublish("a.txt").await.unwrap(), "File unpublication failed");
    assert_eq!(server.state().directory.len().await, 2);

    assert_eq!(
        alice.unpublish("a.txt").await.unwrap(),
        "File a.txt unpublished successfully"
    );
    assert_eq!(alice.list_published().await.unwrap(), "1 file published:\nb.txt");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_search_never_returns_own_files() {
    let (server, _) = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let addr = server.local_addr();
    let hb = Duration::from_secs(1);
    let alice = logged_in_peer(addr, dir.path(), "alice", hb).await;
    let bob = logged_in_peer(addr, dir.path(), "bob", hb).await;
    let carol = logged_in_peer(addr, dir.path(), "carol", hb).await;

    alice.publish("lecture1.mp4").await.unwrap();
    alice.publish("notes.txt").await.unwrap();
    bob.publish("lecture2.mp4").await.unwrap();
    bob.publish("notes.txt").await.unwrap();

    assert_eq!(
        alice.search("lecture").await.unwrap(),
        "1 file found:\nlecture2.mp4"
    );
    assert_eq!(
        carol.search("notes").await.unwrap(),
        "2 files found:\nnotes.txt\nnotes.txt"
    );
    assert_eq!(carol.search("NOTES").await.unwrap(), "No files found");
    assert_eq!(bob.search(".mp4").await.unwrap(), "1 file found:\nlecture1.mp4");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_get_resolves_owner_transfer_address() {
    let (server, _) = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let addr = server.local_addr();

    let alice = logged_in_peer(addr, dir.path(), "alice", Duration::from_secs(1)).await;
    alice.publish("f.txt").await.unwrap();

    let bob = RawClient::connect(addr).await.unwrap();
    bob.login("bob", 7001).await.unwrap();
    assert_eq!(
        bob.request("GET bob f.txt").await.unwrap(),
        alice.transfer_addr().to_string()
    );
    assert_eq!(bob.request("GET bob missing.txt").await.unwrap(), "File not found");
    assert_eq!(bob.request("GET alice f.txt").await.unwrap(), "File not found");

    server.shutdown().await.unwrap();
}
