// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod commands;
mod config;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use commands::{Command, Session};
use config::Config;
use roster_app::{Browser, BrowserCommand, ContactListing, RecordStore, TagListing};
use roster_store::{MemoryStore, SharePointStore};
use roster_testkit::DirectoryFaker;
use runtime::{StoreRuntime, ThreadedExecutor};
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEMO_SEED: u64 = 42;
const DEMO_CONTACTS: usize = 36;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `roster --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    init_tracing(config.log_level())?;

    if options.demo {
        let store = MemoryStore::new();
        DirectoryFaker::new(DEMO_SEED)
            .seed_store(&store, DEMO_CONTACTS)
            .context("seed demo directory")?;
        info!(contacts = DEMO_CONTACTS, "running against seeded in-memory lists");
        if options.check_only {
            return check_lists(store, config.http_timeout()?);
        }
        return serve(store, &config, None, options.command);
    }

    let site = config.site_url().ok_or_else(|| {
        anyhow!(
            "no site configured -- set [site].url in {} or run with --demo",
            options.config_path.display()
        )
    })?;
    let store = SharePointStore::new(site, config.list_titles(), config.http_timeout()?)
        .with_context(|| format!("invalid [site].url {site:?} in config"))?
        .with_token(config.token());
    if options.check_only {
        store
            .ping()
            .with_context(|| format!("reach site {site} -- check [site].url and the network"))?;
        let timeout = store.timeout();
        return check_lists(store, timeout);
    }
    serve(store, &config, Some(site), options.command)
}

fn serve<S: RecordStore>(
    store: S,
    config: &Config,
    site_url: Option<&str>,
    command: Option<Command>,
) -> Result<()> {
    let Some(command) = command else {
        print_help();
        return Ok(());
    };
    debug!(?command, "executing");
    let runtime = StoreRuntime::new(store);
    let lists = config.list_titles();
    let session = Session {
        runtime: &runtime,
        page_size: config.page_size(),
        site_url,
        lists: &lists,
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    session.execute(command, &mut out, &mut confirm_on_stdin)?;
    out.flush()?;
    Ok(())
}

/// Loads the first page of each browsable list on worker threads so a hung
/// list cannot stall the check past the HTTP timeout.
fn check_lists<S: RecordStore + Send + Sync + 'static>(store: S, timeout: Duration) -> Result<()> {
    let executor = ThreadedExecutor::new(store);
    let mut contacts = Browser::<ContactListing>::new(1);
    executor.settle_browser(&mut contacts, BrowserCommand::Mount, timeout)?;
    if let Some(error) = contacts.pager().error() {
        bail!("contacts list is not readable: {error}");
    }
    let mut tags = Browser::<TagListing>::new(1);
    executor.settle_browser(&mut tags, BrowserCommand::Mount, timeout)?;
    if let Some(error) = tags.pager().error() {
        bail!("tags list is not readable: {error}");
    }
    info!("contact and tag lists are readable");
    Ok(())
}

/// `ROSTER_LOG` wins over `[log].level`. Output goes to stderr so stdout
/// stays clean for piping.
fn init_tracing(config_level: &str) -> Result<()> {
    let filter = match env::var("ROSTER_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("invalid ROSTER_LOG filter {directives:?}"))?,
        _ => EnvFilter::try_new(config_level)
            .with_context(|| format!("invalid [log].level {config_level:?}"))?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .context("install log subscriber")
}

fn confirm_on_stdin(prompt: &str) -> Result<bool> {
    let mut stderr = io::stderr();
    write!(stderr, "{prompt}")?;
    stderr.flush()?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("read confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    command: Option<Command>,
}

/// Global flags come first; the first bare word starts the subcommand and
/// everything after it belongs to that subcommand.
fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
        command: None,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            flag if flag.starts_with('-') => {
                return Err(anyhow!(
                    "unknown argument {flag:?}; run with --help to see supported options"
                ));
            }
            _ => {
                let rest: Vec<String> = std::iter::once(arg.as_ref().to_owned())
                    .chain(iter.by_ref().map(|arg| arg.as_ref().to_owned()))
                    .collect();
                options.command = Command::parse(&rest)?;
                break;
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("roster: browse a contact directory and manage contact tags");
    println!();
    println!("usage: roster [options] <command> [args]");
    println!();
    println!("commands:");
    println!("  contacts [--name T] [--department D] [--phone P] [--email E] [--page N]");
    println!("  departments");
    println!("  contact <id>");
    println!("  contact <id> tags [--add ID]... [--remove ID]...");
    println!("  tags [--search T] [--page N]");
    println!("  colors");
    println!("  tag add --name T [--comment C] [--color HEX]");
    println!("  tag edit <id> [--name T] [--comment C] [--color HEX]");
    println!("  tag delete <id> [--yes]");
    println!();
    println!("options:");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Use seeded in-memory lists instead of the site");
    println!("  --check                  Validate config and reach the site, then exit");
    println!("  --help                   Show this help");
}
