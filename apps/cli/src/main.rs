use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    config::load_settings,
    discovery::{PollDirectory, POST_CREATE_REFRESH_DELAY},
    session::PollSession,
    InMemoryLocation, SessionSnapshot,
};
use ledger::{HttpSigner, JsonRpcLedgerClient, LedgerClient};
use shared::domain::{PollId, VoteChoice};

#[derive(Parser, Debug)]
#[command(about = "Yes/No prediction polls against an on-chain contract")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a poll and print the created poll id.
    Create {
        title: String,
        #[arg(default_value = "")]
        description: String,
    },
    /// Vote on a poll and print the refreshed tally.
    Vote {
        poll_id: String,
        #[arg(value_enum)]
        choice: CliChoice,
    },
    /// Show a poll's current state.
    Show { poll_id: String },
    /// List recently created polls from the event log.
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliChoice {
    Yes,
    No,
}

impl From<CliChoice> for VoteChoice {
    fn from(choice: CliChoice) -> Self {
        match choice {
            CliChoice::Yes => VoteChoice::Yes,
            CliChoice::No => VoteChoice::No,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let settings = load_settings();
    if settings.package_id.is_empty() {
        bail!("no package_id configured; set it in poll_client.toml or APP__PACKAGE_ID");
    }
    let deployment = settings.deployment();
    let signer = Arc::new(HttpSigner::new(&settings.signer_endpoint)?);
    let ledger: Arc<dyn LedgerClient> = Arc::new(JsonRpcLedgerClient::new(
        &settings.fullnode_url,
        deployment.clone(),
        signer,
    )?);
    let session = PollSession::new(
        Arc::clone(&ledger),
        settings.account(),
        Arc::new(InMemoryLocation::new()),
    );

    match args.command {
        Command::Create { title, description } => {
            session.create_poll(&title, &description).await;
            let snapshot = session.snapshot().await;
            fail_on_session_error(&snapshot)?;
            match &snapshot.poll_id {
                Some(poll_id) => println!("Created poll {poll_id}"),
                None => println!("Creation confirmed but no poll id was reported"),
            }
            if let Some(hash) = &snapshot.confirmation_hash {
                println!("Transaction: {hash}");
            }

            // Give the event log a moment before showing the updated list.
            let directory = PollDirectory::new(ledger, Some(deployment));
            tokio::time::sleep(POST_CREATE_REFRESH_DELAY).await;
            directory.refresh().await;
            println!("{} poll(s) discoverable", directory.snapshot().await.polls.len());
        }
        Command::Vote { poll_id, choice } => {
            session.load_poll(PollId::new(poll_id)).await;
            fail_on_session_error(&session.snapshot().await)?;
            session.vote(choice.into()).await;
            let snapshot = session.snapshot().await;
            fail_on_session_error(&snapshot)?;
            print_tally(&snapshot);
        }
        Command::Show { poll_id } => {
            session.load_poll(PollId::new(poll_id)).await;
            let snapshot = session.snapshot().await;
            fail_on_session_error(&snapshot)?;
            print_tally(&snapshot);
        }
        Command::List => {
            let directory = PollDirectory::new(ledger, Some(deployment));
            directory.refresh().await;
            let snapshot = directory.snapshot().await;
            if let Some(err) = snapshot.last_error {
                bail!("discovery failed: {err}");
            }
            for entry in &snapshot.polls {
                println!("{}  {}  (by {})", entry.poll_id, entry.title, entry.creator);
            }
            println!("{} poll(s)", snapshot.polls.len());
        }
    }

    Ok(())
}

fn fail_on_session_error(snapshot: &SessionSnapshot) -> Result<()> {
    if let Some(err) = &snapshot.last_error {
        bail!("{err}");
    }
    Ok(())
}

fn print_tally(snapshot: &SessionSnapshot) {
    let Some(record) = &snapshot.record else {
        println!("Poll has no readable state");
        return;
    };
    println!("{}", record.title);
    if !record.description.is_empty() {
        println!("{}", record.description);
    }
    println!(
        "YES {} ({}%)  NO {} ({}%)  total {}",
        record.yes_count,
        snapshot.yes_percentage,
        record.no_count,
        snapshot.no_percentage,
        record.total_votes
    );
    if snapshot.is_creator {
        println!("You created this poll");
    }
}
