use super::super::args::{Cli, Command};

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config_path = cli.config.as_deref();
    match cli.cmd {
        Command::Check(args) => super::check::run(args, config_path).await,
        Command::Batch(args) => super::batch::run(args, config_path).await,
        Command::Config => super::config::run(config_path),
    }
}
