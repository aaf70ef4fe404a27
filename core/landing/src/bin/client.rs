// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use landing::args::ClientArgs;
use landing::build_info;
use landing::config::ConfigLoader;
use landing::runner::{self, DemoOptions};

fn run(args: ClientArgs) -> anyhow::Result<()> {
    let config =
        ConfigLoader::from_optional_file(args.config()).context("failed to load configuration")?;

    let client = match config.client().context("invalid client configuration")? {
        Some(client) => client,
        None => args.client_configuration(),
    };

    let options = DemoOptions {
        iterations: args.iterations(),
        pause: args.pause(),
        call_options: args.call_options(),
    };

    runner::run_client(config, client, options)
}

fn main() -> ExitCode {
    let args = ClientArgs::parse();

    if args.version() {
        println!("{}", build_info::BUILD_INFO);
        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("landing-client: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
