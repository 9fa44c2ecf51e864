//! mpd-picker - browse an MPD library from the terminal
//!
//! Usage:
//!   mpd-picker [list|add|replace|play] [entity] [filter args...] [--width N] [--redraw] [--json]
//!
//! Entities: date, genre, artist, albumartist, album, title, playlist

use std::env;
use std::process;

use anyhow::{bail, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mpd_picker::config;
use mpd_picker::picker::{
    Action, Candidate, EntityKind, GatherContext, MemoryStore, Picker, Query,
};

/// Parsed command line
struct Invocation {
    action: Option<Action>,
    entity: Option<EntityKind>,
    filter_args: Vec<String>,
    width: Option<usize>,
    redraw: bool,
    json: bool,
}

fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut invocation = Invocation {
        action: None,
        entity: None,
        filter_args: Vec::new(),
        width: None,
        redraw: false,
        json: false,
    };

    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--width" => {
                let value = iter.next().context("--width needs a value")?;
                invocation.width = Some(
                    value
                        .parse()
                        .with_context(|| format!("invalid width: {}", value))?,
                );
            }
            "--redraw" => invocation.redraw = true,
            "--json" => invocation.json = true,
            _ => positional.push(arg.clone()),
        }
    }

    let mut positional = positional.into_iter().peekable();
    match positional.peek().map(String::as_str) {
        Some("list") => {
            positional.next();
        }
        Some(word) => {
            if let Ok(action) = word.parse::<Action>() {
                invocation.action = Some(action);
                positional.next();
            }
        }
        None => {}
    }
    if let Some(entity) = positional.next() {
        invocation.entity = Some(entity.parse()?);
    }
    invocation.filter_args = positional.collect();

    if invocation.filter_args.len() % 2 != 0 {
        bail!("filter arguments come in tag/value pairs");
    }
    Ok(invocation)
}

fn print_usage() {
    eprintln!("mpd-picker - browse an MPD library");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  mpd-picker [list|add|replace|play] [entity] [tag value ...] [--width N] [--redraw] [--json]");
    eprintln!();
    eprintln!("Entities: date, genre, artist, albumartist, album, title, playlist");
}

fn print_candidate(candidate: &Candidate, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(candidate)?);
    } else {
        println!("{}", candidate.display_text);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mpd_picker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }
    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            print_usage();
            process::exit(2);
        }
    };

    tracing::info!(
        "Starting mpd-picker v{} ({})",
        env!("MPD_PICKER_VERSION"),
        env!("MPD_PICKER_GIT_SHA")
    );

    let config = config::load_config()?;
    let entity = match invocation.entity {
        Some(entity) => entity,
        None => config.default_entity()?,
    };
    tracing::debug!("Using MPD at {}:{}", config.host, config.port);

    let mut picker = Picker::new(config).with_store(Box::new(MemoryStore::new()));
    picker.start(Query::new(entity, invocation.filter_args));

    let mut ctx = GatherContext {
        viewport_width: invocation.width,
        redraw: invocation.redraw,
    };
    let mut gathered_all = Vec::new();
    loop {
        let gathered = picker.gather(ctx).await?;
        ctx.redraw = false;

        if invocation.action.is_none() {
            for candidate in &gathered.candidates {
                print_candidate(candidate, invocation.json)?;
            }
        }
        gathered_all.extend(gathered.candidates);
        if !gathered.is_async {
            break;
        }
    }

    if let Some(action) = invocation.action {
        let outcome = picker.run_action(action, &gathered_all).await?;
        for rejected in &outcome.rejected {
            eprintln!("{}", rejected);
        }
        if !outcome.is_success() {
            process::exit(1);
        }
    }

    Ok(())
}
