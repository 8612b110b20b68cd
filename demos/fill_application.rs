//! Fill a job application with a locally served model.
//!
//! Start Chrome with `--remote-debugging-port=9222`, open the application and
//! then run:
//!
//! ```text
//! JOBFILL_PROFILE_PATH=profile.txt cargo run --example fill_application -- jobfill.toml
//! ```
//!
//! Without a `[browser] debugger_url` a fresh browser is launched and pointed
//! at `JOBFILL_URL`.

use jobfill::command::{self, Command};
use jobfill::{BrowserBuilder, CompletionClient, Config, FormFiller, ReplyStatus};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> jobfill::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };

    let browser = BrowserBuilder::from_config(config.browser.clone()).build().await?;

    let page = match std::env::var("JOBFILL_URL") {
        Ok(url) => browser.new_page(&url).await?,
        Err(_) => browser.active_page().await?,
    }
    .with_config(&config);
    println!("Filling: {}", page.title().await?);

    let llm = CompletionClient::new(&config.llm)?;
    let filler = FormFiller::new(llm, &config);

    let mut updates = filler.status().subscribe();
    tokio::spawn(async move {
        while let Ok(update) = updates.recv().await {
            println!("[{}] {} ({})", update.action, update.value, update.reason);
        }
    });

    let mut session = filler.new_session();
    let reply = command::handle(&filler, &page, &mut session, &Command::StartFilling).await;
    println!("{}", serde_json::to_string_pretty(&reply).unwrap_or_default());

    page.screenshot_to_file("application_filled.png").await?;
    println!("Screenshot saved to application_filled.png");

    if reply.status == ReplyStatus::Error {
        std::process::exit(1);
    }
    Ok(())
}
