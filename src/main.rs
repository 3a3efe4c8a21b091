mod cli;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    // 初始化日志系统
    apiscenario::logger::init_logger();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => cli::run(args).await,
        Commands::Validate { path } => cli::validate(path),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
