// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use landing::args::ServerArgs;
use landing::build_info;
use landing::config::ConfigLoader;
use landing::runner;

fn run(args: ServerArgs) -> anyhow::Result<()> {
    let mut config =
        ConfigLoader::from_optional_file(args.config()).context("failed to load configuration")?;

    // without a services section, serve a single landing service from the flags
    if !config.has_section("services") {
        config = config
            .with_service("main", &args.service_configuration())
            .context("invalid service configuration")?;
    }

    runner::run(config)
}

fn main() -> ExitCode {
    let args = ServerArgs::parse();

    // If the version flag is set, print the build info and exit
    if args.version() {
        println!("{}", build_info::BUILD_INFO);
        return ExitCode::SUCCESS;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("landing-server: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
