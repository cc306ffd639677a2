use anyhow::Result;
use coordkv::ClientError;
use coordkv::Lookup;
use pretty_assertions::assert_eq;

use crate::fixtures::init_default_ut_tracing;
use crate::fixtures::new_cluster_and_client;

/// Two of three members are down: the request succeeds on the third.
#[async_entry::test(worker_threads = 4, init = "init_default_ut_tracing()", tracing_span = "debug")]
async fn two_of_three_down() -> Result<()> {
    let (cluster, client) = new_cluster_and_client().await?;

    client.set("/foo", "bar", None).await?;

    tracing::info!("--- member 0 and 1 go down, member 2 becomes the leader");
    {
        cluster.set_leader(&cluster.member(2));
        cluster.set_unreachable(&cluster.member(0), true);
        cluster.set_unreachable(&cluster.member(1), true);
    }

    assert_eq!(Some(Lookup::Key("bar".to_string())), client.get("/foo").await?);
    assert_eq!(cluster.member(2), client.current_endpoint());

    // Both dead members were dropped from the cache.
    assert!(!client.members().contains(&cluster.member(0)));
    assert!(!client.members().contains(&cluster.member(1)));

    tracing::info!("--- the client stays on member 2");
    {
        client.set("/foo", "baz", None).await?;
        assert_eq!(Some(&2), cluster.requests_to(&cluster.member(2)).get("keys"));
    }

    Ok(())
}

/// Every member is down: the request fails with `AllNodesDown` after trying each once.
#[async_entry::test(worker_threads = 4, init = "init_default_ut_tracing()", tracing_span = "debug")]
async fn all_down() -> Result<()> {
    let (cluster, client) = new_cluster_and_client().await?;

    for m in cluster.members() {
        cluster.set_unreachable(&m, true);
    }

    let res = client.get("/foo").await;
    assert_eq!(Err(ClientError::AllNodesDown), res);

    for m in cluster.members() {
        assert_eq!(Some(&1), cluster.requests_to(&m).get("keys"), "member: {}", m);
    }

    Ok(())
}

/// The leader is down and the next member is a follower: fail over, then follow the redirect.
#[async_entry::test(worker_threads = 4, init = "init_default_ut_tracing()", tracing_span = "debug")]
async fn failover_then_redirect() -> Result<()> {
    let (cluster, client) = new_cluster_and_client().await?;

    client.set("/foo", "bar", None).await?;

    cluster.set_unreachable(&cluster.member(0), true);
    cluster.set_leader(&cluster.member(2));

    assert_eq!(Some("bar".to_string()), client.set("/foo", "baz", None).await?);

    assert_eq!(cluster.member(2), client.current_endpoint());
    assert_eq!(Some(&1), cluster.requests_to(&cluster.member(1)).get("keys"));

    Ok(())
}

/// A broken connection is not a dead member: it is reported, not failed over.
#[async_entry::test(worker_threads = 4, init = "init_default_ut_tracing()", tracing_span = "debug")]
async fn network_error_is_reported() -> Result<()> {
    let (cluster, client) = new_cluster_and_client().await?;

    cluster.set_network_failure(&cluster.member(0), true);

    let res = client.get("/foo").await;
    assert!(matches!(res, Err(ClientError::Network(_))), "got: {:?}", res);
    assert_eq!(cluster.member(0), client.current_endpoint());
    assert_eq!(3, client.members().len());

    cluster.set_network_failure(&cluster.member(0), false);
    assert_eq!(None, client.get("/foo").await?);

    Ok(())
}
