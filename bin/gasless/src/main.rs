//! `gasless` CLI entry point.

use clap::Parser;
use gasless_cli::{Error, MainCmd};

#[tokio::main]
async fn main() -> Result<(), Error> {
    set_thread_panic_hook();
    MainCmd::parse().run().await.inspect_err(|e| eprintln!("{e}"))
}

/// Sets thread panic hook, exiting the whole process on panic.
fn set_thread_panic_hook() {
    use std::{
        backtrace::Backtrace,
        panic::{set_hook, take_hook},
        process::exit,
    };
    let orig_hook = take_hook();
    set_hook(Box::new(move |panic_info| {
        eprintln!("Custom backtrace: {}", Backtrace::capture());
        orig_hook(panic_info);
        exit(1);
    }));
}
