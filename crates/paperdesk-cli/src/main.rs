// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod check;
mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use paperdesk_app::AppState;
use paperdesk_client::Client;
use paperdesk_db::Store;
use runtime::DbRuntime;
use std::env;
use std::io;
use std::path::PathBuf;

const DEMO_SEED: u64 = 42;

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
            "load config {}; run `paperdesk --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    logging::init(&config.log_path()?, config.log_level())?;
    tracing::info!(
        db = %db_path.display(),
        demo = options.demo,
        check = options.check_only,
        "paperdesk starting"
    );

    let store = if options.demo {
        Store::open_memory()?
    } else {
        Store::open(&db_path).with_context(|| {
            format!(
                "open database {} -- if this path is wrong, set [storage].db_path or PAPERDESK_DB_PATH",
                db_path.display()
            )
        })?
    };
    store.bootstrap()?;
    if options.demo {
        paperdesk_app::seed_demo(&store, DEMO_SEED).context("seed demo preferences")?;
    }

    let client = Client::new(config.controller_base_url(), config.controller_timeout()?)
        .with_context(|| {
            format!(
                "invalid [controller] config in {}; fix base_url/timeout values",
                options.config_path.display()
            )
        })?;
    tracing::debug!(controller = client.base_url(), "controller client ready");
    if options.check_only {
        println!("database: {}", db_path.display());
        return check::report(&store, &client, &mut io::stdout().lock());
    }

    let mut state = AppState::default();
    let mut runtime = DbRuntime::new(&store, client);
    paperdesk_tui::run_app(&mut state, &mut runtime)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => options.print_config_path = true,
            "--print-path" => options.print_db_path = true,
            "--print-example-config" => options.print_example = true,
            "--demo" => options.demo = true,
            "--check" => options.check_only = true,
            "--help" | "-h" => options.show_help = true,
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("paperdesk");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch with seeded demo lists (in-memory)");
    println!("  --check                  Validate config + DB, list stored keys, ping the controller");
    println!("  --help                   Show this help");
}
