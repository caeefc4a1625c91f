//! Interactive CLI surface.
//!
//! Gathers run parameters from the operator, establishes the session, and
//! hands off to the orchestrator. Exit codes: 0 — the run completed per its
//! halt policy (whatever the halt reason); 1 — fatal authentication, config,
//! or target-source failure before or during setup.

use colored::Colorize;
use tracing::{error, info};

use connect_pilot::auth;
use connect_pilot::core::{ConfigStore, Degree, RunConfig, TargetMode, WaitProfile};
use connect_pilot::driver::browser::BrowserSession;
use connect_pilot::driver::cdp::CdpDriver;
use connect_pilot::operator::{ConsoleOperator, Operator};
use connect_pilot::targets::{list, ExplicitListSupplier, SearchResultSupplier, TargetSupplier};
use connect_pilot::workflow;
use connect_pilot::HaltReason;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    println!("{}", "[-] connect-pilot — invitation autopilot".cyan());

    let operator = ConsoleOperator;
    let mut store = ConfigStore::load();

    let cfg = match gather_config(&operator, &store) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("invalid run parameters: {e}");
            std::process::exit(1);
        }
    };

    let headless = std::env::var("CONNECT_PILOT_HEADLESS")
        .map(|v| v.trim() != "0")
        .unwrap_or(true);
    let session = match BrowserSession::launch(headless).await {
        Ok(s) => s,
        Err(e) => {
            error!("browser launch failed: {e}");
            std::process::exit(1);
        }
    };
    let driver = CdpDriver::new(session.page());

    let token = cfg.auth_token.clone().or_else(|| store.session_token());
    if let Err(e) =
        auth::authenticate(&driver, &mut store, &operator, token.as_deref(), &cfg.wait).await
    {
        error!("authentication failed: {e}");
        session.close().await;
        std::process::exit(1);
    }

    let report = match &cfg.mode {
        TargetMode::List { sheet_ref, column } => {
            let http = reqwest::Client::new();
            let addresses = match list::fetch_column(&http, sheet_ref, column).await {
                Ok(a) => a,
                Err(e) => {
                    error!("target source failed: {e}");
                    session.close().await;
                    std::process::exit(1);
                }
            };
            info!("{} profile addresses in the sheet", addresses.len());
            let mut supplier = ExplicitListSupplier::new(addresses, cfg.limit);
            workflow::run(&driver, &mut supplier, &cfg).await
        }
        TargetMode::Search {
            degree,
            keyword,
            location,
        } => {
            let mut supplier = SearchResultSupplier::new(
                &driver,
                *degree,
                keyword.clone(),
                location.clone(),
                cfg.wait,
            );
            workflow::run(&driver, &mut supplier as &mut dyn TargetSupplier, &cfg).await
        }
    };

    print_summary(&report);
    session.close().await;
    Ok(())
}

/// Interactive parameter gathering, mirroring the two run modes.
fn gather_config(operator: &dyn Operator, store: &ConfigStore) -> anyhow::Result<RunConfig> {
    let use_sheet = operator.confirm("Import profile addresses from a sheet? (y/n):")?;

    let mode = if use_sheet {
        let sheet_ref = operator.prompt("Sheet link (shareable or CSV):")?;
        let column = operator.prompt("Column name containing profile addresses:")?;
        TargetMode::List { sheet_ref, column }
    } else {
        let degree: Degree = loop {
            let raw = operator.prompt("Connection degree (1st, 2nd, 3rd):")?;
            match raw.parse() {
                Ok(d) => break d,
                Err(e) => println!("{}", format!("[!] {e}").red()),
            }
        };
        let keyword = operator.prompt("Search keyword:")?;
        let location = operator.prompt("Location (blank to skip):")?;
        TargetMode::Search {
            degree,
            keyword,
            location: Some(location).filter(|l| !l.is_empty()),
        }
    };

    let include_note = operator.confirm("Include a personalized note? (y/n):")?;
    let note_template = if include_note {
        Some(operator.prompt("Note text ({name} will be personalized):")?)
    } else {
        None
    };

    let limit: usize = operator
        .prompt("Maximum number of invitations to send:")?
        .parse()
        .map_err(|e| anyhow::anyhow!("limit must be a number: {e}"))?;

    let auth_token = {
        let stored = store.session_token();
        let hint = if stored.is_some() {
            "Session token (blank to reuse stored):"
        } else {
            "Session token (blank for credential login):"
        };
        let raw = operator.prompt(hint)?;
        Some(raw).filter(|t| !t.is_empty()).or(stored)
    };

    Ok(RunConfig {
        mode,
        note_template,
        include_note,
        limit,
        auth_token,
        wait: WaitProfile::default(),
    })
}

fn print_summary(report: &connect_pilot::RunReport) {
    println!("{}", "----------------------------------------".yellow());
    println!(
        "{} attempted={} sent={} failed={} skipped={}",
        "[=]".yellow(),
        report.attempted,
        report.sent.to_string().green(),
        report.failed.to_string().red(),
        report.skipped
    );
    let halt = match report.halt_reason {
        Some(HaltReason::LimitReached) => "requested limit reached".green(),
        Some(HaltReason::ExhaustedTargets) => "target stream exhausted".yellow(),
        Some(HaltReason::PlatformRateLimited) => "platform invitation ceiling".red(),
        Some(HaltReason::FatalError) => "stopped on fatal error".red(),
        None => "unknown".normal(),
    };
    println!("{} halt: {halt}", "[=]".yellow());
}
