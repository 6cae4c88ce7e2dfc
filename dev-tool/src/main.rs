use std::process::exit;

use anyhow::Error;
use structopt::StructOpt;

use crate::exit_code::FATAL_ERROR;

mod cli_callbacks;
mod evaluate;
mod exit_code;
mod interactions;
mod train;
mod utils;

/// Tooling for the operators of the SmartLearn recommender.
#[derive(StructOpt, Debug)]
enum CommandArgs {
    Train(train::TrainCmd),
    Evaluate(evaluate::EvaluateCmd),
}

impl CommandArgs {
    fn run(self) -> Result<i32, Error> {
        match self {
            CommandArgs::Train(cmd) => cmd.run(),
            CommandArgs::Evaluate(cmd) => cmd.run(),
        }
    }
}

fn main() {
    env_logger::init();

    let exit_code = match CommandArgs::from_args().run() {
        Ok(exit_code) => exit_code,
        Err(error) => {
            eprintln!("{:?}", error);
            FATAL_ERROR
        }
    };

    exit(exit_code);
}
