//! # CLI Module
//!
//! Command-line host for the stake ledger.
//!
//! Every command opens the redb database, rebuilds the manager, runs one
//! operation and, if something changed, saves ledgers and host state in a
//! single write transaction. Custody is simulated by an in-memory wallet
//! set persisted next to the ledgers.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use stakelock_core::{
    AccountId, Amount, AuthorizationGate, Clock, CustodyState, DEFAULT_LOCK_PERIOD_DAYS,
    InMemoryCustody, ManagerConfig, Operation, RedbStore, RoleGate, StakeError, StakeEvent,
    StakeManager, StakeResult, SystemClock, Timestamp, encode_snapshot,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::info;

/// Error type for CLI commands.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Blob key holding [`HostState`].
const HOST_STATE_KEY: &str = "host";

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Parser, Debug)]
#[command(name = "stakelock", version, about = "Maturity-dated stake ledger")]
pub struct Cli {
    /// Path to the redb database file.
    #[arg(long, global = true, env = "STAKELOCK_DB", default_value = "stakelock.redb")]
    pub db: PathBuf,

    /// Pin the clock to this Unix timestamp (seconds) instead of wall time.
    #[arg(long, global = true, env = "STAKELOCK_NOW")]
    pub now: Option<u64>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a fresh database.
    Init {
        #[arg(long, default_value_t = DEFAULT_LOCK_PERIOD_DAYS)]
        lock_days: u32,
        /// Account granted every privileged operation.
        #[arg(long)]
        admin: String,
        /// Overwrite an existing database.
        #[arg(long)]
        force: bool,
    },
    /// Credit an account's external wallet.
    Fund { account: String, amount: Amount },
    Deposit { account: String, amount: Amount },
    Withdraw { account: String, amount: Amount },
    WithdrawMax { account: String },
    Restake { account: String, amount: Amount },
    RestakeMax { account: String },
    /// Lock stake for an account until an explicit maturity (privileged).
    RestakeFor {
        #[arg(long)]
        operator: String,
        account: String,
        amount: Amount,
        /// Unix timestamp (seconds).
        maturity: u64,
    },
    /// Change the lock period for later deposits (privileged).
    SetLockPeriod {
        #[arg(long)]
        caller: String,
        days: u32,
    },
    /// Grant a privileged operation; the caller must hold it already.
    Grant {
        #[arg(long)]
        caller: String,
        account: String,
        operation: Operation,
    },
    Balance { account: String },
    Status,
    /// Write the full ledger state to a file.
    Export {
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Binary,
}

// =============================================================================
// SESSION
// =============================================================================

/// Wall clock, or a fixed instant when `--now` is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostClock {
    fixed: Option<Timestamp>,
}

impl HostClock {
    #[must_use]
    pub fn new(now: Option<u64>) -> Self {
        Self {
            fixed: now.map(Timestamp::from_secs),
        }
    }
}

impl Clock for HostClock {
    fn now(&self) -> Timestamp {
        self.fixed.unwrap_or_else(|| SystemClock.now())
    }
}

/// Host-owned state persisted beside the ledgers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostState {
    pub custody: CustodyState,
    pub grants: BTreeMap<Operation, BTreeSet<AccountId>>,
}

pub type HostManager = StakeManager<HostClock, InMemoryCustody, RoleGate>;

/// An open database plus the manager rebuilt from it.
pub struct Session {
    store: RedbStore,
    manager: HostManager,
}

impl Session {
    pub fn manager(&self) -> &HostManager {
        &self.manager
    }
}

/// Open an initialized database.
pub fn open_session(db: &Path, now: Option<u64>) -> CliResult<Session> {
    if !db.exists() {
        return Err(format!(
            "database {} not found; run `stakelock init` first",
            db.display()
        )
        .into());
    }
    let store = RedbStore::open(db)?;
    if !store.is_initialized()? {
        return Err(format!("database {} is not initialized", db.display()).into());
    }

    let snapshot = store.load_snapshot()?;
    let host: HostState = store.load_blob(HOST_STATE_KEY)?.unwrap_or_default();
    let manager = StakeManager::from_snapshot(
        snapshot,
        HostClock::new(now),
        InMemoryCustody::from_state(host.custody),
        RoleGate::from_grants(host.grants),
    )?;
    Ok(Session { store, manager })
}

/// Persist ledgers, custody and grants in one transaction.
pub fn save_session(session: &Session) -> CliResult<()> {
    let host = HostState {
        custody: session.manager.custody().state(),
        grants: session.manager.gate().grants(),
    };
    session
        .store
        .save_snapshot_with_blob(&session.manager.snapshot(), HOST_STATE_KEY, &host)?;
    Ok(())
}

// =============================================================================
// OUTPUT
// =============================================================================

#[derive(Debug, Serialize)]
pub struct DepositView {
    pub amount: String,
    pub maturity: u64,
}

#[derive(Debug, Serialize)]
pub struct BalanceReport {
    pub account: String,
    pub balance: String,
    pub unlocked: String,
    pub locked: String,
    pub next_maturity: Option<u64>,
    pub wallet: String,
    pub deposits: Vec<DepositView>,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub now: u64,
    pub lock_period_days: u32,
    pub accounts: usize,
    pub total_staked: String,
    pub custody_reserve: String,
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_event(event: Option<&StakeEvent>, json: bool) -> CliResult<()> {
    match (event, json) {
        (event, true) => print_json(&event),
        (Some(event), false) => {
            println!("{event}");
            Ok(())
        }
        (None, false) => {
            println!("nothing to do");
            Ok(())
        }
    }
}

/// Run one manager operation and save if it produced an event.
fn mutate<F>(db: &Path, now: Option<u64>, json: bool, op: F) -> CliResult<()>
where
    F: FnOnce(&HostManager) -> StakeResult<Option<StakeEvent>>,
{
    let session = open_session(db, now)?;
    let event = op(&session.manager)?;
    match &event {
        Some(event) => {
            save_session(&session)?;
            info!(%event, "committed");
        }
        None => info!("no matured stake, nothing committed"),
    }
    print_event(event.as_ref(), json)
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Create a database with `admin` holding every privileged grant.
///
/// The new database is built beside `db` and renamed over it only once it
/// is fully written, so a failed `--force` keeps the old one.
pub fn cmd_init(db: &Path, lock_days: u32, admin: &str, force: bool) -> CliResult<()> {
    if db.exists() && !force {
        return Err(format!(
            "database {} already exists; use --force to overwrite",
            db.display()
        )
        .into());
    }

    let admin = AccountId::new(admin);
    let manager = StakeManager::new(
        ManagerConfig {
            lock_period_days: lock_days,
        },
        HostClock::default(),
        InMemoryCustody::new(),
        RoleGate::with_admin(&admin),
    )?;

    let staging = staging_path(db);
    if staging.exists() {
        std::fs::remove_file(&staging)?;
    }
    let written: CliResult<()> = RedbStore::create(&staging)
        .map_err(Into::into)
        .and_then(|store| save_session(&Session { store, manager }));
    if let Err(err) = written {
        // Best effort; the original database is untouched either way.
        let _ = std::fs::remove_file(&staging);
        return Err(err);
    }
    std::fs::rename(&staging, db)?;

    info!(db = %db.display(), lock_days, %admin, "database initialized");
    println!("initialized {} (lock period {lock_days} days)", db.display());
    Ok(())
}

fn staging_path(db: &Path) -> PathBuf {
    let mut path = db.as_os_str().to_owned();
    path.push(".init");
    PathBuf::from(path)
}

pub fn cmd_fund(
    db: &Path,
    now: Option<u64>,
    json: bool,
    account: &str,
    amount: Amount,
) -> CliResult<()> {
    let session = open_session(db, now)?;
    let account = AccountId::new(account);
    session.manager.custody().fund(&account, amount)?;
    save_session(&session)?;

    let wallet = session.manager.custody().wallet(&account);
    info!(%account, %amount, "wallet funded");
    if json {
        print_json(&serde_json::json!({
            "account": account.as_str(),
            "funded": amount.to_string(),
            "wallet": wallet.to_string(),
        }))
    } else {
        println!("{account} wallet: {wallet}");
        Ok(())
    }
}

pub fn cmd_deposit(
    db: &Path,
    now: Option<u64>,
    json: bool,
    account: &str,
    amount: Amount,
) -> CliResult<()> {
    let account = AccountId::new(account);
    mutate(db, now, json, |m| m.deposit(&account, amount).map(Some))
}

pub fn cmd_withdraw(
    db: &Path,
    now: Option<u64>,
    json: bool,
    account: &str,
    amount: Amount,
) -> CliResult<()> {
    let account = AccountId::new(account);
    mutate(db, now, json, |m| m.withdraw(&account, amount).map(Some))
}

pub fn cmd_withdraw_max(db: &Path, now: Option<u64>, json: bool, account: &str) -> CliResult<()> {
    let account = AccountId::new(account);
    mutate(db, now, json, |m| m.withdraw_max(&account))
}

pub fn cmd_restake(
    db: &Path,
    now: Option<u64>,
    json: bool,
    account: &str,
    amount: Amount,
) -> CliResult<()> {
    let account = AccountId::new(account);
    mutate(db, now, json, |m| m.restake(&account, amount).map(Some))
}

pub fn cmd_restake_max(db: &Path, now: Option<u64>, json: bool, account: &str) -> CliResult<()> {
    let account = AccountId::new(account);
    mutate(db, now, json, |m| m.restake_max(&account))
}

pub fn cmd_restake_for(
    db: &Path,
    now: Option<u64>,
    json: bool,
    operator: &str,
    account: &str,
    amount: Amount,
    maturity: u64,
) -> CliResult<()> {
    let operator = AccountId::new(operator);
    let account = AccountId::new(account);
    mutate(db, now, json, |m| {
        m.restake_or_deposit_at_for(&operator, &account, amount, Timestamp::from_secs(maturity))
            .map(Some)
    })
}

pub fn cmd_set_lock_period(
    db: &Path,
    now: Option<u64>,
    json: bool,
    caller: &str,
    days: u32,
) -> CliResult<()> {
    let caller = AccountId::new(caller);
    mutate(db, now, json, |m| m.set_lock_period_days(&caller, days).map(Some))
}

pub fn cmd_grant(db: &Path, caller: &str, account: &str, operation: Operation) -> CliResult<()> {
    let session = open_session(db, None)?;
    let caller = AccountId::new(caller);
    let account = AccountId::new(account);
    let gate = session.manager.gate();
    if !gate.is_authorized(&caller, operation) {
        return Err(StakeError::Unauthorized { caller, operation }.into());
    }
    gate.grant(&account, operation);
    save_session(&session)?;

    info!(%caller, %account, %operation, "grant added");
    println!("{account} may now {operation}");
    Ok(())
}

pub fn cmd_balance(db: &Path, now: Option<u64>, json: bool, account: &str) -> CliResult<()> {
    let session = open_session(db, now)?;
    let manager = session.manager();
    let account = AccountId::new(account);

    let report = BalanceReport {
        account: account.to_string(),
        balance: manager.balance(&account).to_string(),
        unlocked: manager.unlocked_balance(&account).to_string(),
        locked: manager.locked_balance(&account).to_string(),
        next_maturity: manager.next_maturity(&account).map(Timestamp::secs),
        wallet: manager.custody().wallet(&account).to_string(),
        deposits: manager
            .deposits(&account)
            .into_iter()
            .map(|d| DepositView {
                amount: d.amount.to_string(),
                maturity: d.maturity.secs(),
            })
            .collect(),
    };

    if json {
        return print_json(&report);
    }
    println!("account:   {}", report.account);
    println!("balance:   {}", report.balance);
    println!("unlocked:  {}", report.unlocked);
    println!("locked:    {}", report.locked);
    println!("wallet:    {}", report.wallet);
    if let Some(next) = report.next_maturity {
        println!("next unlock at {next}");
    }
    for d in &report.deposits {
        println!("  {} until {}", d.amount, d.maturity);
    }
    Ok(())
}

pub fn cmd_status(db: &Path, now: Option<u64>, json: bool) -> CliResult<()> {
    let session = open_session(db, now)?;
    let manager = session.manager();
    let snapshot = manager.snapshot();

    let report = StatusReport {
        now: manager.now().secs(),
        lock_period_days: snapshot.lock_period_days,
        accounts: snapshot.accounts.len(),
        total_staked: snapshot.total_staked().to_string(),
        custody_reserve: manager.custody().reserve().to_string(),
    };

    if json {
        return print_json(&report);
    }
    println!("now:              {}", report.now);
    println!("lock period:      {} days", report.lock_period_days);
    println!("accounts:         {}", report.accounts);
    println!("total staked:     {}", report.total_staked);
    println!("custody reserve:  {}", report.custody_reserve);
    Ok(())
}

pub fn cmd_export(db: &Path, output: &Path, format: ExportFormat) -> CliResult<()> {
    let session = open_session(db, None)?;
    let snapshot = session.manager.snapshot();
    let bytes = match format {
        ExportFormat::Json => serde_json::to_vec_pretty(&snapshot)?,
        ExportFormat::Binary => encode_snapshot(&snapshot)?,
    };
    std::fs::write(output, bytes)?;

    info!(output = %output.display(), ?format, "snapshot exported");
    println!("exported {} accounts to {}", snapshot.accounts.len(), output.display());
    Ok(())
}

/// Dispatch a parsed command line.
pub fn run(cli: Cli) -> CliResult<()> {
    let Cli {
        db,
        now,
        json,
        command,
    } = cli;
    let db = db.as_path();

    match command {
        Command::Init {
            lock_days,
            admin,
            force,
        } => cmd_init(db, lock_days, &admin, force),
        Command::Fund { account, amount } => cmd_fund(db, now, json, &account, amount),
        Command::Deposit { account, amount } => cmd_deposit(db, now, json, &account, amount),
        Command::Withdraw { account, amount } => cmd_withdraw(db, now, json, &account, amount),
        Command::WithdrawMax { account } => cmd_withdraw_max(db, now, json, &account),
        Command::Restake { account, amount } => cmd_restake(db, now, json, &account, amount),
        Command::RestakeMax { account } => cmd_restake_max(db, now, json, &account),
        Command::RestakeFor {
            operator,
            account,
            amount,
            maturity,
        } => cmd_restake_for(db, now, json, &operator, &account, amount, maturity),
        Command::SetLockPeriod { caller, days } => {
            cmd_set_lock_period(db, now, json, &caller, days)
        }
        Command::Grant {
            caller,
            account,
            operation,
        } => cmd_grant(db, &caller, &account, operation),
        Command::Balance { account } => cmd_balance(db, now, json, &account),
        Command::Status => cmd_status(db, now, json),
        Command::Export { output, format } => cmd_export(db, &output, format),
    }
}
