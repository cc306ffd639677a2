#[path = "../fixtures/mod.rs"]
mod fixtures;

// The number indicate the preferred running order for these case.

mod t20_directory;
mod t30_redirect;
mod t40_failover;
mod t50_watch;
mod t70_membership;
mod t80_ttl;
