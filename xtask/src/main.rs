use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Tasks for the project", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project
    Build,
    /// Run the test suite
    Test,
    /// Run the slave; extra arguments are passed through
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Create and bring up a virtual CAN interface (needs root)
    Vcan {
        #[arg(default_value = "vcan0")]
        name: String,
    },
}

fn cargo(args: &[&str], what: &str) -> Result<()> {
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{} failed", what);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Build => {
            println!("Building project...");
            cargo(&["build", "--workspace"], "Build")?;
        }
        Commands::Test => {
            println!("Running tests...");
            cargo(&["test", "--workspace"], "Test")?;
        }
        Commands::Run { args } => {
            println!("Running XCP slave...");
            let mut cmd = vec!["run", "-p", "xcp-cli", "--"];
            cmd.extend(args.iter().map(String::as_str));
            cargo(&cmd, "Run")?;
        }
        Commands::Vcan { name } => {
            println!("Setting up {}...", name);
            for args in [
                vec!["link", "add", "dev", name.as_str(), "type", "vcan"],
                vec!["link", "set", "up", name.as_str()],
            ] {
                let status = Command::new("ip").args(&args).status()?;
                if !status.success() {
                    anyhow::bail!("ip {} failed", args.join(" "));
                }
            }
        }
    }

    Ok(())
}
