use anyhow::Result;
use clap::{Parser, Subcommand};
use server_api::{issue_token, list_tokens, lookup_token, void_token, ApiContext};
use shared::{
    domain::{Token, TokenStatus},
    protocol::{IssueTokenRequest, ListTokensQuery},
};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/tokens.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    IssueToken {
        code: String,
        /// Value in minor units, e.g. 500000 for NGN 5000.00.
        value_cents: i64,
        #[arg(long, default_value = "NGN")]
        currency: String,
    },
    VoidToken {
        code: String,
    },
    ListTokens {
        #[arg(long)]
        status: Option<TokenStatus>,
        #[arg(long)]
        limit: Option<u32>,
    },
    ShowToken {
        code: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = ApiContext {
        storage: Storage::new(&cli.database_url).await?,
    };

    match cli.command {
        Command::IssueToken {
            code,
            value_cents,
            currency,
        } => {
            let token = issue_token(
                &ctx,
                &IssueTokenRequest {
                    code,
                    value_cents,
                    currency,
                },
            )
            .await?;
            println!("issued token_id={} {}", token.id, describe(&token));
        }
        Command::VoidToken { code } => {
            let token = lookup_token(&ctx, &code).await?;
            let token = void_token(&ctx, token.id).await?;
            println!("voided {}", describe(&token));
        }
        Command::ListTokens { status, limit } => {
            let tokens = list_tokens(&ctx, &ListTokensQuery { status, limit })
                .await?;
            for token in &tokens {
                println!("{}", describe(token));
            }
            println!("{} token(s)", tokens.len());
        }
        Command::ShowToken { code } => {
            let token = lookup_token(&ctx, &code).await?;
            println!("token_id={}", token.id);
            println!("code={}", token.code);
            println!("value={}", token.formatted_value());
            println!("status={}", token.status.label());
            println!("issued={}", token.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            if let Some(redeemed_at) = token.redeemed_at {
                println!("redeemed={}", redeemed_at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
    }

    Ok(())
}

fn describe(token: &Token) -> String {
    format!(
        "code={} value={} status={}",
        token.code,
        token.formatted_value(),
        token.status.label()
    )
}
