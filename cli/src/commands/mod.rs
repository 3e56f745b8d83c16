mod completion;
mod run;

pub use self::run::Interrupted;

#[derive(clap::Subcommand)]
pub enum Subcommand {
    /// Load program images and run them until they halt
    Run(self::run::RunOpt),

    /// Generate shell completions
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Self::Run(opt) => opt.exec(),
            Self::Completion(opt) => {
                opt.exec();
                Ok(())
            }
        }
    }
}
