//! Splitledger command-line tool.
//!
//! Replays a JSON snapshot through the ledger engine and prints, as JSON, the
//! pairwise balances and settlement plan of every group plus each user's
//! position in every scope they belong to.
//!
//! Usage: splitledger <snapshot.json>

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use splitledger_core::balance::{
    BalanceCache, BalanceService, NetPosition, PairwiseBalance, SettlementPlan,
};
use splitledger_core::ledger::Participant;
use splitledger_shared::AppConfig;
use splitledger_shared::config::LoggingConfig;
use splitledger_shared::types::{GroupId, UserId};
use splitledger_store::{MemoryLedger, Rejection, Replay, Snapshot};

type Balances = BalanceService<MemoryLedger, MemoryLedger>;

#[derive(Serialize)]
struct Report<'a> {
    rejected: &'a [Rejection],
    reconciled: usize,
    groups: Vec<GroupReport>,
    users: Vec<UserReport>,
}

#[derive(Serialize)]
struct GroupReport {
    group_id: GroupId,
    name: String,
    balances: Vec<PairwiseBalance>,
    plan: SettlementPlan,
}

#[derive(Serialize)]
struct UserReport {
    user_id: UserId,
    positions: Vec<NetPosition>,
}

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging);

    let path = std::env::args()
        .nth(1)
        .context("usage: splitledger <snapshot.json>")?;
    let snapshot =
        Snapshot::from_path(&path).with_context(|| format!("Failed to load snapshot {path}"))?;
    let replay = snapshot.replay(config.ledger.default_currency)?;

    let balances = BalanceService::new(Arc::clone(&replay.ledger), Arc::clone(&replay.ledger))
        .with_cache(BalanceCache::from_config(&config.cache));

    let groups = snapshot
        .groups
        .iter()
        .filter_map(|seed| group_report(&replay, &balances, seed.id).transpose())
        .collect::<anyhow::Result<Vec<_>>>()?;

    let users = known_users(&snapshot, &replay)
        .into_iter()
        .map(|user_id| -> anyhow::Result<UserReport> {
            Ok(UserReport {
                user_id,
                positions: balances.compute_overall_balance(user_id)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    info!(path = %path, groups = groups.len(), users = users.len(), "Report ready");

    let report = Report {
        rejected: &replay.rejected,
        reconciled: replay.reconciled,
        groups,
        users,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Logs go to stderr so stdout stays a clean JSON document.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Balances and plan of one group, read as its first registered member.
fn group_report(
    replay: &Replay,
    balances: &Balances,
    group_id: GroupId,
) -> anyhow::Result<Option<GroupReport>> {
    let Some(record) = replay.ledger.group(group_id) else {
        return Ok(None);
    };
    let Some(requester) = record.members.iter().find_map(Participant::user_id) else {
        warn!(%group_id, "Group has no registered member, skipping");
        return Ok(None);
    };

    Ok(Some(GroupReport {
        group_id,
        name: record.name,
        balances: balances.compute_group_balances(group_id, requester)?,
        plan: balances.simplify_debts(group_id, requester)?,
    }))
}

/// Every registered user named by a group or a friendship, in id order.
fn known_users(snapshot: &Snapshot, replay: &Replay) -> BTreeSet<UserId> {
    let members = snapshot
        .groups
        .iter()
        .filter_map(|seed| replay.ledger.group(seed.id))
        .flat_map(|record| record.members.into_iter())
        .filter_map(|p| p.user_id());
    let friends = snapshot
        .friendships
        .iter()
        .flat_map(|f| [f.users.0, f.users.1]);
    members.chain(friends).collect()
}
