#![forbid(unsafe_code)]

use std::process::exit;

use clap::builder::Styles;
use clap::{ArgAction, ArgGroup, Parser};
use tracing::error;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

mod commands;
mod terminal;

use crate::commands::{Interrupted, Subcommand};

const STYLES: Styles = Styles::styled()
    .header(anstyle::AnsiColor::Yellow.on_default().bold())
    .usage(anstyle::AnsiColor::Yellow.on_default().bold())
    .literal(anstyle::AnsiColor::Green.on_default())
    .placeholder(anstyle::AnsiColor::Cyan.on_default());

#[derive(Parser)]
#[command(version, author, about, styles = STYLES, group = ArgGroup::new("format"))]
struct Opt {
    /// Increase the level of verbosity. Can be used multiple times.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Force colored output. Default is to check if the output is a tty
    #[arg(short = 'c', long, global = true, group = "format")]
    color: bool,

    /// Force non-colored output. Default is to check if the output is a tty
    #[arg(short = 'C', long, global = true, group = "format")]
    no_color: bool,

    /// Use JSON output for log messages
    #[arg(short, long, global = true, group = "format")]
    json: bool,

    #[command(subcommand)]
    command: Subcommand,
}

impl Opt {
    const fn log_filter(&self) -> &'static str {
        // Logs share the terminal with the running program, keep them quiet by default
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "lc3_emulator=debug,lc3_cli=debug,info",
            3 => "lc3_emulator=trace,lc3_cli=trace,info",
            4..=u8::MAX => "trace",
        }
    }

    fn should_use_colors(&self) -> bool {
        use std::io::IsTerminal;

        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            std::io::stderr().is_terminal()
        }
    }

    fn filter_layer(&self) -> EnvFilter {
        // Parse log level from env
        EnvFilter::try_from_default_env()
            // or infer from args
            .unwrap_or_else(|_| EnvFilter::new(self.log_filter()))
    }
}

fn main() {
    // First, parse the arguments
    let opt = Opt::parse();

    // Then, setup the tracing formatter for logging and instrumentation
    let registry = tracing_subscriber::Registry::default().with(opt.filter_layer());

    if opt.json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr);
        registry.with(json_layer).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .without_time()
            .with_ansi(opt.should_use_colors())
            .with_target(false)
            .with_writer(std::io::stderr);
        registry.with(fmt_layer).init();
    }

    // And run the command
    let res = opt.command.exec();
    if let Err(e) = res {
        if e.downcast_ref::<Interrupted>().is_some() {
            exit(130);
        }

        error!("{e:#}");
        exit(1);
    }
}
