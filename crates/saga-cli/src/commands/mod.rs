mod list;
mod run;

use clap::Subcommand;

pub(crate) use run::RunArgs;

use crate::error::Result;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run a saga scenario file
    Run(RunArgs),
    /// List the available sagas and their steps
    List,
}

impl Commands {
    /// Returns whether the command succeeded; a saga that compensates is a
    /// failure but not an error.
    pub(crate) fn execute(self) -> Result<bool> {
        match self {
            Self::Run(args) => run::run(&args),
            Self::List => {
                list::run();
                Ok(true)
            }
        }
    }
}
