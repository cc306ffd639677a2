use anyhow::Result;
use coordkv::Lookup;
use pretty_assertions::assert_eq;

use crate::fixtures::init_default_ut_tracing;
use crate::fixtures::new_client;
use crate::fixtures::new_cluster_and_client;

/// A request sent to a follower is redirected to the leader, and the client sticks to the leader.
#[async_entry::test(worker_threads = 4, init = "init_default_ut_tracing()", tracing_span = "debug")]
async fn redirect_to_leader() -> Result<()> {
    let cluster = coordkv_memcluster::MemCluster::new(3);
    let leader = cluster.member(0);
    let follower = cluster.member(1);

    tracing::info!("--- a client that only knows a follower");
    let client = new_client(&cluster, 1)?;
    assert_eq!(follower, client.current_endpoint());
    assert!(client.members().is_empty());

    client.set("/foo", "bar", None).await?;

    tracing::info!("--- the client switched to the leader and learnt the members from it");
    {
        assert_eq!(leader, client.current_endpoint());
        assert_eq!(Some(&leader), client.members().first());
        assert_eq!(3, client.members().len());
    }

    tracing::info!("--- later requests go to the leader directly");
    {
        assert_eq!(Some(Lookup::Key("bar".to_string())), client.get("/foo").await?);

        let to_follower = cluster.requests_to(&follower);
        assert_eq!(Some(&1), to_follower.get("keys"));
        assert_eq!(None, to_follower.get("machines"));

        let to_leader = cluster.requests_to(&leader);
        assert_eq!(Some(&2), to_leader.get("keys"));
        assert_eq!(Some(&1), to_leader.get("machines"));
    }

    Ok(())
}

/// When the leader changes, the old leader redirects the client to the new one.
#[async_entry::test(worker_threads = 4, init = "init_default_ut_tracing()", tracing_span = "debug")]
async fn follow_leader_change() -> Result<()> {
    let (cluster, client) = new_cluster_and_client().await?;

    client.set("/foo", "bar", None).await?;
    assert_eq!(cluster.member(0), client.current_endpoint());

    tracing::info!("--- elect member 2");
    let new_leader = cluster.member(2);
    cluster.set_leader(&new_leader);

    assert_eq!(Some(Lookup::Key("bar".to_string())), client.get("/foo").await?);

    assert_eq!(new_leader, client.current_endpoint());
    assert_eq!(
        vec![cluster.member(2), cluster.member(0), cluster.member(1)],
        client.members()
    );

    Ok(())
}
