use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    HttpTokenStore, LookupOutcome, Notice, NoticeSeverity, ReceiptSink, RedeemOutcome,
    RedemptionController, RedemptionError, TokenStore,
};
use shared::domain::Token;
use storage::Storage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod profile;
mod sink;

use profile::{load_profile, StoreTarget, TerminalProfile};
use sink::{FileReceiptSink, StdoutReceiptSink};

type Controller = RedemptionController<Arc<dyn TokenStore>>;

#[derive(Parser, Debug)]
#[command(about = "Look up, redeem and print fuel tokens at a station terminal")]
struct Args {
    #[arg(long, default_value = "redeem.toml")]
    profile: PathBuf,
    #[arg(long, env = "REDEEM_SERVER_URL", conflicts_with = "database_url")]
    server_url: Option<String>,
    #[arg(long, env = "REDEEM_DATABASE_URL")]
    database_url: Option<String>,
    #[arg(long)]
    store_timeout_secs: Option<u64>,
    /// Write receipts here instead of printing them to stdout.
    #[arg(long)]
    receipt_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exits non-zero unless the token exists and is still issued.
    Lookup {
        code: String,
    },
    /// Exits non-zero unless the token was redeemed (and printed, with `--print`).
    Redeem {
        code: String,
        #[arg(long)]
        print: bool,
    },
    /// Interactive session: lookup, redeem, receipt, reset, status, quit.
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let profile = load_profile(&args.profile)?.merge(TerminalProfile {
        server_url: args.server_url,
        database_url: args.database_url,
        store_timeout_secs: args.store_timeout_secs,
        receipt_dir: args.receipt_dir,
    });
    let store = open_store(&profile.store_target()?).await?;
    let controller = RedemptionController::new(store).with_store_timeout(profile.store_timeout());
    let sink: Box<dyn ReceiptSink> = match &profile.receipt_dir {
        Some(dir) => Box::new(FileReceiptSink::new(dir)),
        None => Box::new(StdoutReceiptSink),
    };

    run(&controller, sink.as_ref(), args.command).await
}

async fn run(controller: &Controller, sink: &dyn ReceiptSink, command: Command) -> Result<()> {
    match command {
        Command::Lookup { code } => {
            if !lookup(controller, &code).await {
                bail!("token '{}' is not redeemable", code.trim());
            }
        }
        Command::Redeem { code, print } => {
            if !(lookup(controller, &code).await && redeem(controller).await) {
                bail!("token '{}' was not redeemed", code.trim());
            }
            if print && !print_receipt(controller, sink).await {
                bail!("token '{}' was redeemed but its receipt was not delivered", code.trim());
            }
        }
        Command::Shell => shell(controller, sink).await?,
    }

    Ok(())
}

async fn open_store(target: &StoreTarget) -> Result<Arc<dyn TokenStore>> {
    let store: Arc<dyn TokenStore> = match target {
        StoreTarget::Http(url) => {
            info!(%url, "using token service");
            Arc::new(HttpTokenStore::new(url)?)
        }
        StoreTarget::Database(url) => {
            info!(%url, "using local token database");
            Arc::new(Storage::new(url).await?)
        }
    };
    Ok(store)
}

/// Returns true when a token is loaded and still redeemable.
async fn lookup(controller: &Controller, code: &str) -> bool {
    match controller.lookup(code).await {
        Ok(LookupOutcome::Loaded { token, warning }) => {
            print_token(&token);
            match warning {
                Some(warning) => {
                    print_notice(&warning.notice());
                    false
                }
                None => true,
            }
        }
        Ok(LookupOutcome::Superseded) => false,
        Err(err) => {
            report(&err);
            false
        }
    }
}

async fn redeem(controller: &Controller) -> bool {
    match controller.redeem().await {
        Ok(RedeemOutcome::Redeemed(token)) => {
            print_notice(&Notice::redeemed());
            print_token(&token);
            true
        }
        Ok(RedeemOutcome::NotRedeemable) => {
            println!("Nothing to redeem. Look up an issued token first.");
            false
        }
        Ok(RedeemOutcome::Superseded) => false,
        Err(err) => {
            report(&err);
            false
        }
    }
}

async fn print_receipt(controller: &Controller, sink: &dyn ReceiptSink) -> bool {
    match controller.render_receipt().await {
        Ok(receipt) => match sink.deliver(&receipt) {
            Ok(()) => true,
            Err(err) => {
                eprintln!("failed to deliver receipt: {err:#}");
                false
            }
        },
        Err(err) => {
            report(&err);
            false
        }
    }
}

async fn shell(controller: &Controller, sink: &dyn ReceiptSink) -> Result<()> {
    println!("Token redemption. Commands: lookup <code>, redeem, receipt, reset, status, quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command.to_ascii_lowercase().as_str() {
            "" => {}
            "lookup" | "l" => {
                lookup(controller, rest).await;
            }
            "redeem" | "r" => {
                redeem(controller).await;
            }
            "receipt" | "print" | "p" => {
                print_receipt(controller, sink).await;
            }
            "reset" => {
                controller.reset().await;
                println!("Cleared.");
            }
            "status" | "s" => {
                let snapshot = controller.snapshot().await;
                println!("phase={:?}", snapshot.phase);
                match &snapshot.token {
                    Some(token) => print_token(token),
                    None => println!("No token loaded."),
                }
                println!(
                    "redeemable={} printable={}",
                    controller.can_redeem().await,
                    controller.can_print_receipt().await
                );
            }
            "quit" | "exit" | "q" => break,
            other => println!("Unknown command '{other}'."),
        }
    }
    Ok(())
}

fn print_token(token: &Token) {
    println!("  Code:   {}", token.code);
    println!("  Value:  {}", token.formatted_value());
    println!("  Status: {}", token.status.label());
    println!("  Issued: {}", token.created_at.format("%Y-%m-%d"));
}

fn print_notice(notice: &Notice) {
    let marker = match notice.severity {
        NoticeSeverity::Info => "i",
        NoticeSeverity::Success => "+",
        NoticeSeverity::Destructive => "!",
    };
    println!("[{marker}] {}: {}", notice.title, notice.description);
}

fn report(err: &RedemptionError) {
    tracing::debug!(error = ?err, "redemption workflow error");
    print_notice(&err.notice());
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
