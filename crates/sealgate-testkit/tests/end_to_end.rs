//! End-to-end tests: client, key servers and ledger together.

use std::sync::Arc;
use std::time::Duration;

use sealgate::{ErrorKind, Nonce, PolicyRef, SealError};
use sealgate_testkit::fixtures::{policy, wallet, ScriptedSigner, SignerScript, TestCluster, T0};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn nonce(s: &str) -> Nonce {
    Nonce::from_text(s).unwrap()
}

#[tokio::test]
async fn whitelisted_user_round_trip() {
    init_tracing();
    let cluster = TestCluster::new(2, 1).await;
    let alice = wallet(1);
    cluster.whitelist(&policy(1), &[alice.address()]).await;

    let client = cluster.client();
    let (ciphertext, _) = client
        .encrypt(&policy(1), &nonce("n1"), b"the contract")
        .await
        .unwrap();
    let session = client.create_session(alice.address(), &alice).await.unwrap();

    let plaintext = client
        .decrypt(&ciphertext, &session, &policy(1), &nonce("n1"))
        .await
        .unwrap();
    assert_eq!(plaintext, b"the contract");
}

#[tokio::test]
async fn empty_plaintext_round_trip() {
    let cluster = TestCluster::new(1, 1).await;
    let alice = wallet(1);
    cluster.whitelist(&policy(1), &[alice.address()]).await;

    let client = cluster.client();
    let (ciphertext, _) = client.encrypt(&policy(1), &nonce("n1"), b"").await.unwrap();
    let session = client.create_session(alice.address(), &alice).await.unwrap();

    let plaintext = client
        .decrypt(&ciphertext, &session, &policy(1), &nonce("n1"))
        .await
        .unwrap();
    assert!(plaintext.is_empty());
}

#[tokio::test]
async fn expired_session_never_reaches_servers() {
    let cluster = TestCluster::new(2, 1).await;
    let alice = wallet(1);
    cluster.whitelist(&policy(1), &[alice.address()]).await;

    let client = cluster.client();
    let (ciphertext, _) = client.encrypt(&policy(1), &nonce("n1"), b"x").await.unwrap();
    let session = client.create_session(alice.address(), &alice).await.unwrap();

    cluster.clock.set(T0 + 9 * 60_000 + 59_000);
    assert!(client.is_active(&session));

    cluster.clock.set(T0 + 10 * 60_000 + 1_000);
    assert!(!client.is_active(&session));
    let err = client
        .decrypt(&ciphertext, &session, &policy(1), &nonce("n1"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SessionExpired);
    assert_eq!(cluster.total_requests(), 0);
    assert_eq!(cluster.ledger.dry_run_count(), 0);
}

#[tokio::test]
async fn user_outside_whitelist_is_denied() {
    let cluster = TestCluster::new(2, 1).await;
    let alice = wallet(1);
    let mallory = wallet(2);
    cluster.whitelist(&policy(1), &[alice.address()]).await;

    let client = cluster.client();
    let (ciphertext, _) = client.encrypt(&policy(1), &nonce("n1"), b"x").await.unwrap();
    let session = client
        .create_session(mallory.address(), &mallory)
        .await
        .unwrap();

    let err = client
        .decrypt(&ciphertext, &session, &policy(1), &nonce("n1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    assert!(err.is_authorization());
    assert!(!err.is_unavailable());
}

#[tokio::test]
async fn revocation_applies_to_next_request() {
    let cluster = TestCluster::new(1, 1).await;
    let alice = wallet(1);
    cluster.whitelist(&policy(1), &[alice.address()]).await;

    let client = cluster.client();
    let (ciphertext, _) = client.encrypt(&policy(1), &nonce("n1"), b"x").await.unwrap();
    let session = client.create_session(alice.address(), &alice).await.unwrap();

    assert!(client
        .decrypt(&ciphertext, &session, &policy(1), &nonce("n1"))
        .await
        .is_ok());

    cluster
        .ledger
        .remove_from_whitelist(&policy(1), &alice.address())
        .await;
    let err = client
        .decrypt(&ciphertext, &session, &policy(1), &nonce("n1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    assert_eq!(cluster.ledger.dry_run_count(), 2);
}

#[tokio::test]
async fn session_for_other_address_is_denied_remotely() {
    // alice signs, but the session claims bob's address
    let cluster = TestCluster::new(1, 1).await;
    let alice = wallet(1);
    let bob = wallet(2);
    cluster.whitelist(&policy(1), &[bob.address()]).await;

    let client = cluster.client();
    let (ciphertext, _) = client.encrypt(&policy(1), &nonce("n1"), b"x").await.unwrap();
    let session = client.create_session(bob.address(), &alice).await.unwrap();

    let err = client
        .decrypt(&ciphertext, &session, &policy(1), &nonce("n1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    assert_eq!(cluster.ledger.dry_run_count(), 0);
}

#[tokio::test]
async fn all_servers_down_is_unavailable() {
    let cluster = TestCluster::new(2, 1).await;
    let alice = wallet(1);
    cluster.whitelist(&policy(1), &[alice.address()]).await;

    let client = cluster.client();
    let (ciphertext, _) = client.encrypt(&policy(1), &nonce("n1"), b"x").await.unwrap();
    let session = client.create_session(alice.address(), &alice).await.unwrap();

    cluster.take_offline(2);
    let err = client
        .decrypt(&ciphertext, &session, &policy(1), &nonce("n1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn threshold_survives_one_server_down() {
    let cluster = TestCluster::new(3, 2).await;
    let alice = wallet(1);
    cluster.whitelist(&policy(1), &[alice.address()]).await;

    let client = cluster.client();
    let (ciphertext, _) = client.encrypt(&policy(1), &nonce("n1"), b"2 of 3").await.unwrap();
    let session = client.create_session(alice.address(), &alice).await.unwrap();

    cluster.take_offline(1);
    let plaintext = client
        .decrypt(&ciphertext, &session, &policy(1), &nonce("n1"))
        .await
        .unwrap();
    assert_eq!(plaintext, b"2 of 3");

    cluster.take_offline(2);
    let err = client
        .decrypt(&ciphertext, &session, &policy(1), &nonce("n1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
}

#[tokio::test]
async fn slow_server_times_out() {
    let cluster = TestCluster::new(1, 1).await;
    let alice = wallet(1);
    cluster.whitelist(&policy(1), &[alice.address()]).await;

    let mut config = cluster.config.clone();
    config.request_timeout_ms = 50;
    let client = cluster.client_with(config);
    let (ciphertext, _) = client.encrypt(&policy(1), &nonce("n1"), b"x").await.unwrap();
    let session = client.create_session(alice.address(), &alice).await.unwrap();

    cluster.servers[0].set_delay(Duration::from_secs(5));
    let err = client
        .decrypt(&ciphertext, &session, &policy(1), &nonce("n1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
}

#[tokio::test]
async fn encryption_needs_resolvable_servers() {
    let cluster = TestCluster::new(2, 2).await;
    cluster.ledger.set_offline(true);

    let err = cluster
        .client()
        .encrypt(&policy(1), &nonce("n1"), b"x")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EncryptionServiceUnavailable);
}

#[tokio::test]
async fn changed_nonce_or_policy_fails() {
    let cluster = TestCluster::new(1, 1).await;
    let alice = wallet(1);
    cluster.whitelist(&policy(1), &[alice.address()]).await;
    cluster.whitelist(&policy(2), &[alice.address()]).await;

    let client = cluster.client();
    let (ciphertext, _) = client.encrypt(&policy(1), &nonce("n1"), b"x").await.unwrap();
    let session = client.create_session(alice.address(), &alice).await.unwrap();

    for (p, n) in [(policy(1), nonce("n2")), (policy(1), nonce("N1")), (policy(2), nonce("n1"))] {
        let err = client.decrypt(&ciphertext, &session, &p, &n).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
    }
    assert_eq!(cluster.total_requests(), 0);
}

#[tokio::test]
async fn shifted_policy_boundary_is_denied() {
    let cluster = TestCluster::new(2, 1).await;
    let alice = wallet(1);
    let mallory = wallet(2);
    let bound = PolicyRef::parse("0xabc123").unwrap();
    let shorter = PolicyRef::parse("0xabc1").unwrap();
    cluster.whitelist(&bound, &[alice.address()]).await;
    cluster.whitelist(&shorter, &[mallory.address()]).await;

    let client = cluster.client();
    let (ciphertext, _) = client
        .encrypt(&bound, &nonce("n1"), b"secret for abc123")
        .await
        .unwrap();
    let session = client.create_session(mallory.address(), &mallory).await.unwrap();

    // Every split of the bound reference that leaves a non-empty policy.
    for (policy, tail) in [("0xabc1", vec![0x23]), ("0xab", vec![0xc1, 0x23])] {
        let mut moved = tail;
        moved.extend_from_slice(b"n1");
        let err = client
            .decrypt(
                &ciphertext,
                &session,
                &PolicyRef::parse(policy).unwrap(),
                &Nonce::from_bytes(moved).unwrap(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied, "{policy}");
    }
    assert_eq!(cluster.total_requests(), 0);
    assert_eq!(cluster.ledger.dry_run_count(), 0);

    let alice_session = client.create_session(alice.address(), &alice).await.unwrap();
    let plaintext = client
        .decrypt(&ciphertext, &alice_session, &bound, &nonce("n1"))
        .await
        .unwrap();
    assert_eq!(plaintext, b"secret for abc123");
}

#[tokio::test]
async fn concurrent_decrypts_share_one_session() {
    let cluster = TestCluster::new(3, 2).await;
    let alice = wallet(1);
    cluster.whitelist(&policy(1), &[alice.address()]).await;

    let client = Arc::new(cluster.client());
    let session = client.create_session(alice.address(), &alice).await.unwrap();

    let mut items = Vec::new();
    for i in 0..8 {
        let n = nonce(&format!("item-{i}"));
        let body = format!("body {i}").into_bytes();
        let (ciphertext, _) = client.encrypt(&policy(1), &n, &body).await.unwrap();
        items.push((n, body, ciphertext));
    }

    let results = futures::future::join_all(items.iter().map(|(n, _, ciphertext)| {
        let client = client.clone();
        let session = &session;
        async move { client.decrypt(ciphertext, session, &policy(1), n).await }
    }))
    .await;

    for ((_, body, _), result) in items.iter().zip(results) {
        assert_eq!(&result.unwrap(), body);
    }
}

#[tokio::test]
async fn backup_key_decrypts_without_servers() {
    let cluster = TestCluster::new(2, 2).await;
    let client = cluster.client();
    let (ciphertext, backup) = client.encrypt(&policy(1), &nonce("n1"), b"x").await.unwrap();

    cluster.take_offline(2);
    assert_eq!(client.decrypt_with_backup(&ciphertext, &backup).unwrap(), b"x");
}

#[tokio::test]
async fn signer_outcomes() {
    let cluster = TestCluster::new(1, 1).await;
    let client = cluster.client();

    let cases = [
        (SignerScript::Reject, ErrorKind::AuthorizationDenied),
        (SignerScript::NoWallet, ErrorKind::AuthorizationDenied),
        (SignerScript::Fail, ErrorKind::SigningFailed),
        (SignerScript::Empty, ErrorKind::SigningFailed),
    ];
    for (script, kind) in cases {
        let signer = ScriptedSigner::new(wallet(1), script);
        let err: SealError = client
            .create_session(signer.address(), &signer)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind, "{script:?}");
        assert_eq!(signer.calls(), 1);
    }

    let signer = ScriptedSigner::new(wallet(1), SignerScript::Sign);
    let session = client.create_session(signer.address(), &signer).await.unwrap();
    assert_eq!(session.address(), &signer.address());
    assert_eq!(signer.calls(), 1);
}

#[tokio::test]
async fn record_export_round_trip() {
    let cluster = TestCluster::new(1, 1).await;
    let alice = wallet(1);
    cluster.whitelist(&policy(1), &[alice.address()]).await;

    let client = cluster.client();
    let record = client
        .encrypt_record(&policy(1), &Nonce::random(), b"payload", serde_json::Value::Null)
        .await
        .unwrap();
    let restored = sealgate::EncryptedRecord::from_json(&record.to_json().unwrap()).unwrap();

    let session = client.create_session(alice.address(), &alice).await.unwrap();
    let plaintext = client
        .decrypt(
            &restored.ciphertext,
            &session,
            &restored.policy_ref,
            &restored.nonce().unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(plaintext, b"payload");
}
