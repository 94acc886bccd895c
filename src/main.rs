use ballot_wizard::commands::{self, Action, HELP};
use ballot_wizard::config::Config;
use ballot_wizard::render::render;
use ballot_wizard::{ElectionService, HttpElectionService, VotingWizard};
use log::{error, info};
use std::env;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

type InputLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let Some(election_id) = env::args().nth(1) else {
        eprintln!("Usage: ballot-wizard <election-id>");
        return;
    };

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    let service: Arc<dyn ElectionService> = match HttpElectionService::new(&config) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("Failed to set up the election API client: {}", e);
            return;
        }
    };

    if let Err(e) = run(&config, service, &election_id).await {
        error!("Voting session ended with an error: {}", e);
    }
}

async fn run(
    config: &Config,
    service: Arc<dyn ElectionService>,
    election_id: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let student_id = match &config.student_id {
        Some(id) => id.clone(),
        None => prompt(&mut lines, "Student ID: ").await?,
    };
    let password = match &config.password {
        Some(password) => password.clone(),
        None => prompt(&mut lines, "Password: ").await?,
    };

    let session = service.login(&student_id, &password).await?;
    println!("Welcome, {}.", session.voter().name);

    let mut wizard =
        VotingWizard::new(Arc::clone(&service), session).with_load_timeout(config.load_timeout);
    let outcome = drive(&mut wizard, &mut lines, election_id).await;
    wizard.close().await;
    outcome
}

/// Runs the wizard until the voter finishes or leaves. The caller owns
/// closing the wizard, so every way out of here still logs the session out.
async fn drive(
    wizard: &mut VotingWizard,
    lines: &mut InputLines,
    election_id: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if wizard.start(election_id).await.is_err() {
        print!("{}", render(wizard));
        return Ok(());
    }

    loop {
        print!("{}", render(wizard));
        if wizard.state().is_terminal() {
            return Ok(());
        }

        let Some(line) = prompt_line(lines, "> ").await? else {
            return Ok(());
        };
        match commands::parse_action(&line) {
            None | Some(Action::Help) => println!("{}", HELP),
            Some(Action::Quit) => {
                info!("Voter left the ballot without submitting");
                return Ok(());
            }
            Some(action) => {
                if let Err(e) = commands::dispatch(wizard, action).await {
                    if !commands::is_shown_as_notice(wizard, &*e) {
                        println!("{}", e);
                    }
                }
            }
        }
    }
}

async fn prompt(
    lines: &mut InputLines,
    label: &str,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    match prompt_line(lines, label).await? {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(format!("{} was not provided", label.trim_end_matches(": ")).into()),
    }
}

async fn prompt_line(lines: &mut InputLines, label: &str) -> std::io::Result<Option<String>> {
    print!("{}", label);
    std::io::stdout().flush()?;
    lines.next_line().await
}
