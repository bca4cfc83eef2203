use clap::{Arg, ArgAction, Command};
use page_pilot::{ActionOptions, Config, PageSession, Selector};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("page-pilot")
        .about("Open a page and act on it with human-readable selectors")
        .arg(Arg::new("url").required(true).help("Page to open"))
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("JSON file with session options (camelCase keys)"),
        )
        .arg(
            Arg::new("headful")
                .long("headful")
                .action(ArgAction::SetTrue)
                .help("Show the browser window"),
        )
        .arg(
            Arg::new("click")
                .long("click")
                .value_name("LABEL")
                .action(ArgAction::Append)
                .help("Click the element with this label; repeatable"),
        )
        .arg(
            Arg::new("write")
                .long("write")
                .value_name("LABEL=TEXT")
                .action(ArgAction::Append)
                .help("Write TEXT into the text field labelled LABEL; repeatable"),
        )
}

async fn run(matches: clap::ArgMatches) -> page_pilot::Result<()> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_json_str(&tokio::fs::read_to_string(path).await?)?,
        None => Config::default(),
    };
    if matches.get_flag("headful") {
        config.set("headless", serde_json::Value::Bool(false))?;
    }

    let session = PageSession::launch(config).await?;
    let mut events = session.events().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(session = %event.session_id, "{} ({}ms)", event.description, event.duration_ms);
        }
    });

    if let Some(url) = matches.get_one::<String>("url") {
        session.goto(url, ActionOptions::default()).await?;
    }

    for pair in matches.get_many::<String>("write").into_iter().flatten() {
        let (label, text) = pair.split_once('=').unwrap_or((pair.as_str(), ""));
        session
            .write(text, Some(Selector::text_box(label)), ActionOptions::default())
            .await?;
    }
    for label in matches.get_many::<String>("click").into_iter().flatten() {
        session.click(label.as_str(), ActionOptions::default()).await?;
    }

    info!("now at {}", session.current_url().await?);
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run(cli().get_matches()).await {
        error!("{}", err);
        std::process::exit(1);
    }
}
