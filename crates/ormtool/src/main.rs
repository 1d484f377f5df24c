mod channels;
mod cli;
mod meter;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let config = cli.config.as_deref();
    match cli.command {
        Command::Pack(args) => run::run_pack(args, config),
        Command::Channels(args) => {
            for path in channels::run_channels(args)? {
                println!("{}", path.display());
            }
            Ok(())
        }
        Command::Where => run::run_where(config),
    }
}
