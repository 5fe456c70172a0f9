use std::fs;

use trickle_ctl::GetOutcome;

use crate::*;

#[tokio::test]
async fn test_get_downloads_identical_bytes() {
    let (server, _) = spawn_server().await;
    let addr = server.local_addr();
    let alice_dir = tempfile::tempdir().unwrap();
    let bob_dir = tempfile::tempdir().unwrap();
    let hb = Duration::from_secs(1);

    let content: Vec<u8> = (0..200_000u32).map(|i| (i * 31 % 251) as u8).collect();
    fs::write(alice_dir.path().join("lecture.bin"), &content).unwrap();

    let alice = logged_in_peer(addr, alice_dir.path(), "alice", hb).await;
    let bob = logged_in_peer(addr, bob_dir.path(), "bob", hb).await;
    alice.publish("lecture.bin").await.unwrap();

    match bob.get("lecture.bin").await.unwrap() {
        GetOutcome::Downloaded { path, bytes, from } => {
            assert_eq!(path, bob_dir.path().join("lecture.bin"));
            assert_eq!(bytes, content.len() as u64);
            assert_eq!(from, alice.transfer_addr());
        }
        other => panic!("expected a download, got {other:?}"),
    }
    assert_eq!(fs::read(bob_dir.path().join("lecture.bin")).unwrap(), content);

    server.shutdown().await.unwrap();
}

/// Publishing does not check the disk; fetching a file the owner no longer
/// has yields an empty download.
#[tokio::test]
async fn test_get_of_missing_file_is_empty() {
    let (server, _) = spawn_server().await;
    let addr = server.local_addr();
    let alice_dir = tempfile::tempdir().unwrap();
    let bob_dir = tempfile::tempdir().unwrap();
    let hb = Duration::from_secs(1);

    let alice = logged_in_peer(addr, alice_dir.path(), "alice", hb).await;
    let bob = logged_in_peer(addr, bob_dir.path(), "bob", hb).await;
    alice.publish("ghost.txt").await.unwrap();

    match bob.get("ghost.txt").await.unwrap() {
        GetOutcome::Downloaded { bytes, .. } => assert_eq!(bytes, 0),
        other => panic!("expected an empty download, got {other:?}"),
    }
    assert!(fs::read(bob_dir.path().join("ghost.txt")).unwrap().is_empty());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_get_unknown_and_own_files() {
    let (server, _) = spawn_server().await;
    let addr = server.local_addr();
    let alice_dir = tempfile::tempdir().unwrap();
    let hb = Duration::from_secs(1);

    fs::write(alice_dir.path().join("mine.txt"), b"mine").unwrap();
    let alice = logged_in_peer(addr, alice_dir.path(), "alice", hb).await;
    alice.publish("mine.txt").await.unwrap();

    assert_eq!(alice.get("nobody-has-this").await.unwrap(), GetOutcome::NotFound);
    assert_eq!(alice.get("mine.txt").await.unwrap(), GetOutcome::NotFound);

    server.shutdown().await.unwrap();
}

/// Several peers downloading from one owner at once all get the full file.
#[tokio::test]
async fn test_concurrent_downloads_from_one_owner() {
    let (server, _) = spawn_server().await;
    let addr = server.local_addr();
    let alice_dir = tempfile::tempdir().unwrap();
    let hb = Duration::from_secs(1);

    let content = vec![7u8; 64 * 1024];
    fs::write(alice_dir.path().join("shared.bin"), &content).unwrap();
    let alice = logged_in_peer(addr, alice_dir.path(), "alice", hb).await;
    alice.publish("shared.bin").await.unwrap();

    let mut downloads = Vec::new();
    for name in ["bob", "carol", "dave"] {
        let dir = tempfile::tempdir().unwrap();
        let peer = logged_in_peer(addr, dir.path(), name, hb).await;
        downloads.push(tokio::spawn(async move {
            let outcome = peer.get("shared.bin").await.unwrap();
            let data = fs::read(dir.path().join("shared.bin")).unwrap();
            (outcome, data)
        }));
    }

    for task in downloads {
        let (outcome, data) = task.await.unwrap();
        assert!(matches!(outcome, GetOutcome::Downloaded { bytes: 65_536, .. }));
        assert_eq!(data, content);
    }

    server.shutdown().await.unwrap();
}
