//! # Attachment Resolution Tests
//!
//! Exercises `resolve_and_fetch` and `ResolutionSession` against the
//! in-memory metadata client: ordering, deduplication, cycle detection and
//! failure propagation.

use intuf_core::{TargetDescriptor, TargetInfo, TargetPath};
use intuf_fetch::{resolve_and_fetch, FetchError, InMemoryMetadataClient, ResolutionSession};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn tp(s: &str) -> TargetPath {
    TargetPath::new(s).expect("valid target path")
}

fn supply_chain() -> InMemoryMetadataClient {
    InMemoryMetadataClient::new()
        .with_target(tp("app-1.0.whl"), b"wheel bytes", &[tp("layout.json"), tp("alice.pub")])
        .with_target(tp("layout.json"), b"{\"steps\":[]}", &[tp("build.link"), tp("create.link")])
        .with_target(tp("alice.pub"), b"alice key", &[])
        .with_target(tp("build.link"), b"build", &[])
        .with_target(tp("create.link"), b"create", &[])
}

// ── Traversal ────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolves_every_transitive_attachment_once() {
    let client = supply_chain();
    let workdir = tempfile::tempdir().unwrap();

    let resolved = resolve_and_fetch(&client, &tp("app-1.0.whl"), workdir.path())
        .await
        .expect("resolution succeeds");

    assert_eq!(
        resolved.paths(),
        vec![
            tp("build.link"),
            tp("create.link"),
            tp("layout.json"),
            tp("alice.pub"),
            tp("app-1.0.whl"),
        ]
    );
    for name in ["app-1.0.whl", "layout.json", "alice.pub", "build.link", "create.link"] {
        assert_eq!(client.download_count(&tp(name)), 1, "{name} downloaded once");
        assert!(workdir.path().join(name).is_file(), "{name} staged");
    }
    assert_eq!(resolved.downloads(), 5);
    assert_eq!(resolved.cache_hits(), 0);
}

#[tokio::test]
async fn shared_attachment_is_fetched_once() {
    let client = InMemoryMetadataClient::new()
        .with_target(tp("app.whl"), b"a", &[tp("left.layout"), tp("right.layout")])
        .with_target(tp("left.layout"), b"l", &[tp("shared.pub")])
        .with_target(tp("right.layout"), b"r", &[tp("shared.pub")])
        .with_target(tp("shared.pub"), b"k", &[]);
    let workdir = tempfile::tempdir().unwrap();

    let resolved = resolve_and_fetch(&client, &tp("app.whl"), workdir.path())
        .await
        .unwrap();

    assert_eq!(resolved.len(), 4);
    assert_eq!(client.download_count(&tp("shared.pub")), 1);
    assert_eq!(client.lookup_count(&tp("shared.pub")), 1);
}

#[tokio::test]
async fn target_without_attachments_resolves_alone() {
    let client = InMemoryMetadataClient::new().with_target(tp("bare.tar.gz"), b"tarball", &[]);
    let workdir = tempfile::tempdir().unwrap();

    let resolved = resolve_and_fetch(&client, &tp("bare.tar.gz"), workdir.path())
        .await
        .unwrap();
    assert_eq!(resolved.paths(), vec![tp("bare.tar.gz")]);
}

#[tokio::test]
async fn staged_copy_is_reused() {
    let client = supply_chain();
    let workdir = tempfile::tempdir().unwrap();
    std::fs::write(workdir.path().join("alice.pub"), b"alice key").unwrap();

    let resolved = resolve_and_fetch(&client, &tp("app-1.0.whl"), workdir.path())
        .await
        .unwrap();

    assert_eq!(client.download_count(&tp("alice.pub")), 0);
    assert_eq!(resolved.cache_hits(), 1);
    assert!(resolved.get(&tp("alice.pub")).unwrap().cache_hit);
}

#[tokio::test]
async fn tampered_staged_copy_is_downloaded_again() {
    let client = supply_chain();
    let workdir = tempfile::tempdir().unwrap();
    std::fs::write(workdir.path().join("alice.pub"), b"mallory key").unwrap();

    resolve_and_fetch(&client, &tp("app-1.0.whl"), workdir.path())
        .await
        .unwrap();

    assert_eq!(client.download_count(&tp("alice.pub")), 1);
    assert_eq!(std::fs::read(workdir.path().join("alice.pub")).unwrap(), b"alice key");
}

#[tokio::test]
async fn session_skips_targets_resolved_for_an_earlier_root() {
    let client = InMemoryMetadataClient::new()
        .with_target(tp("a.whl"), b"a", &[tp("common.layout")])
        .with_target(tp("b.whl"), b"b", &[tp("common.layout")])
        .with_target(tp("common.layout"), b"c", &[]);
    let workdir = tempfile::tempdir().unwrap();

    let mut session = ResolutionSession::new(&client, workdir.path());
    session.resolve(&tp("a.whl")).await.unwrap();
    session.resolve(&tp("b.whl")).await.unwrap();
    session.resolve(&tp("a.whl")).await.unwrap();

    assert!(session.is_resolved(&tp("common.layout")));
    assert_eq!(client.download_count(&tp("common.layout")), 1);
    assert_eq!(client.download_count(&tp("a.whl")), 1);
    assert_eq!(session.into_resolved().len(), 3);
}

// ── Failures ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_node_cycle_is_rejected() {
    let client = InMemoryMetadataClient::new()
        .with_target(tp("a.whl"), b"a", &[tp("b.layout")])
        .with_target(tp("b.layout"), b"b", &[tp("a.whl")]);
    let workdir = tempfile::tempdir().unwrap();

    let err = resolve_and_fetch(&client, &tp("a.whl"), workdir.path())
        .await
        .unwrap_err();

    match err {
        FetchError::CyclicAttachmentGraph { path, chain } => {
            assert_eq!(path, tp("a.whl"));
            assert_eq!(chain, vec![tp("a.whl"), tp("b.layout"), tp("a.whl")]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
    assert_eq!(client.total_downloads(), 0);
}

#[tokio::test]
async fn self_reference_is_a_cycle() {
    let client = InMemoryMetadataClient::new().with_target(tp("loop.whl"), b"x", &[tp("loop.whl")]);
    let workdir = tempfile::tempdir().unwrap();

    let err = resolve_and_fetch(&client, &tp("loop.whl"), workdir.path())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FetchError::CyclicAttachmentGraph { ref chain, .. } if chain.len() == 2
    ));
}

#[tokio::test]
async fn missing_attachment_fails_before_parent_is_downloaded() {
    let client = InMemoryMetadataClient::new().with_target(
        tp("app.whl"),
        b"wheel",
        &[tp("present.pub"), tp("missing.layout")],
    )
    .with_target(tp("present.pub"), b"k", &[]);
    let workdir = tempfile::tempdir().unwrap();

    let err = resolve_and_fetch(&client, &tp("app.whl"), workdir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::TargetNotFound(ref p) if *p == tp("missing.layout")));
    assert_eq!(client.download_count(&tp("app.whl")), 0);
}

#[tokio::test]
async fn missing_root_is_not_found() {
    let client = InMemoryMetadataClient::new();
    let workdir = tempfile::tempdir().unwrap();

    let err = resolve_and_fetch(&client, &tp("ghost.whl"), workdir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::TargetNotFound(_)));
}

#[tokio::test]
async fn download_failure_is_terminal() {
    let client = supply_chain().with_failing_download(tp("build.link"));
    let workdir = tempfile::tempdir().unwrap();

    let err = resolve_and_fetch(&client, &tp("app-1.0.whl"), workdir.path())
        .await
        .unwrap_err();

    match err {
        FetchError::Network { target, .. } => assert_eq!(target, tp("build.link")),
        other => panic!("expected network failure, got {other:?}"),
    }
    assert_eq!(client.download_count(&tp("create.link")), 0);
}

#[tokio::test]
async fn corrupt_content_is_an_integrity_failure() {
    let honest = InMemoryMetadataClient::new().with_target(tp("app.whl"), b"honest", &[]);
    let descriptor = {
        let workdir = tempfile::tempdir().unwrap();
        resolve_and_fetch(&honest, &tp("app.whl"), workdir.path())
            .await
            .unwrap()
            .get(&tp("app.whl"))
            .unwrap()
            .descriptor
            .clone()
    };
    let client = InMemoryMetadataClient::new().with_raw_target(descriptor, b"tampered");
    let workdir = tempfile::tempdir().unwrap();

    let err = resolve_and_fetch(&client, &tp("app.whl"), workdir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Network { .. }));
    assert!(err.to_string().contains("integrity"));
    assert!(!workdir.path().join("app.whl").exists());
}

#[tokio::test]
async fn malformed_attachment_list_is_rejected() {
    let mut custom = serde_json::Map::new();
    custom.insert("in-toto".into(), serde_json::json!("root.layout"));
    let descriptor = TargetDescriptor {
        path: tp("odd.whl"),
        info: TargetInfo {
            length: 3,
            hashes: BTreeMap::from([("sha256".to_string(), intuf_core::bytes_digest(b"odd"))]),
            custom: Some(custom),
        },
    };
    let client = InMemoryMetadataClient::new().with_raw_target(descriptor, b"odd");
    let workdir = tempfile::tempdir().unwrap();

    let err = resolve_and_fetch(&client, &tp("odd.whl"), workdir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::MalformedAttachments { .. }));
}

#[tokio::test]
async fn failed_resolution_leaves_session_usable() {
    let client = InMemoryMetadataClient::new()
        .with_target(tp("broken.whl"), b"x", &[tp("shared.pub"), tp("gone.layout")])
        .with_target(tp("ok.whl"), b"y", &[tp("shared.pub")])
        .with_target(tp("shared.pub"), b"k", &[]);
    let workdir = tempfile::tempdir().unwrap();

    let mut session = ResolutionSession::new(&client, workdir.path());
    assert!(session.resolve(&tp("broken.whl")).await.is_err());
    assert!(!session.is_resolved(&tp("broken.whl")));
    assert!(session.is_resolved(&tp("shared.pub")));

    session.resolve(&tp("ok.whl")).await.unwrap();
    assert_eq!(client.download_count(&tp("shared.pub")), 1);
}

// ── Properties ───────────────────────────────────────────────────────────

/// Edges only point from lower to higher indices, so the graph is acyclic.
fn dag_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..8).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n).prop_map(
            move |matrix| {
                matrix
                    .into_iter()
                    .enumerate()
                    .map(|(i, row)| {
                        row.into_iter()
                            .enumerate()
                            .filter(|&(j, edge)| edge && j > i)
                            .map(|(j, _)| j)
                            .collect()
                    })
                    .collect()
            },
        )
    })
}

fn reachable(edges: &[Vec<usize>]) -> BTreeSet<usize> {
    let mut seen = BTreeSet::from([0]);
    let mut stack = vec![0];
    while let Some(node) = stack.pop() {
        for &next in &edges[node] {
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }
    seen
}

/// A path from node 0 to `target` along DAG edges.
fn path_to(edges: &[Vec<usize>], target: usize) -> Vec<usize> {
    let mut parent: BTreeMap<usize, usize> = BTreeMap::new();
    let mut seen = BTreeSet::from([0]);
    let mut stack = vec![0];
    while let Some(node) = stack.pop() {
        for &next in &edges[node] {
            if seen.insert(next) {
                parent.insert(next, node);
                stack.push(next);
            }
        }
    }
    let mut path = vec![target];
    let mut current = target;
    while let Some(&p) = parent.get(&current) {
        path.push(p);
        current = p;
    }
    path.reverse();
    path
}

proptest! {
    #[test]
    fn any_reachable_back_edge_is_reported_as_a_cycle(
        edges in dag_strategy(),
        tail_pick in any::<prop::sample::Index>(),
        head_pick in any::<prop::sample::Index>(),
    ) {
        let name = |i: usize| tp(&format!("node-{i}.bin"));
        let reachable: Vec<usize> = reachable(&edges).into_iter().collect();
        let tail = reachable[tail_pick.index(reachable.len())];
        let on_path = path_to(&edges, tail);
        let head = on_path[head_pick.index(on_path.len())];

        let mut edges = edges;
        edges[tail].push(head);

        let mut client = InMemoryMetadataClient::new();
        for (i, children) in edges.iter().enumerate() {
            let attachments: Vec<TargetPath> = children.iter().map(|&j| name(j)).collect();
            client = client.with_target(name(i), format!("content {i}").as_bytes(), &attachments);
        }
        let workdir = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let err = runtime
            .block_on(resolve_and_fetch(&client, &name(0), workdir.path()))
            .unwrap_err();

        match err {
            FetchError::CyclicAttachmentGraph { path, chain } => {
                prop_assert_eq!(chain.first().cloned(), Some(name(0)));
                prop_assert_eq!(chain.last().cloned(), Some(path.clone()));
                prop_assert!(chain.iter().filter(|p| **p == path).count() >= 2);
            }
            other => prop_assert!(false, "expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn every_reachable_node_is_downloaded_exactly_once(edges in dag_strategy()) {
        let name = |i: usize| tp(&format!("node-{i}.bin"));
        let mut client = InMemoryMetadataClient::new();
        for (i, children) in edges.iter().enumerate() {
            let attachments: Vec<TargetPath> = children.iter().map(|&j| name(j)).collect();
            client = client.with_target(name(i), format!("content {i}").as_bytes(), &attachments);
        }
        let workdir = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let resolved = runtime
            .block_on(resolve_and_fetch(&client, &name(0), workdir.path()))
            .unwrap();

        let expected = reachable(&edges);
        prop_assert_eq!(resolved.len(), expected.len());
        prop_assert_eq!(client.total_downloads(), expected.len());
        for i in expected {
            prop_assert_eq!(client.download_count(&name(i)), 1);
        }
        // Root completes last.
        prop_assert_eq!(resolved.paths().last().cloned(), Some(name(0)));
    }
}
