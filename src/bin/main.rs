use std::error::Error;

use clap::Parser;
use serde_json::json;
use smart_control::SmartControl;
use smart_control::authenticator::Password;
use smart_control::parameters::{Commands, ConnectionArgs, OutputFormat};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "smart-control-cli")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    output: OutputFormat,

    /// Print debug logs to stderr
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    let password = match cli.connection.password.clone() {
        Some(password) => Password::from(password),
        None => Password::from(rpassword::prompt_password("Password: ")?),
    };

    let smart_control = SmartControl::try_from_config(cli.connection.into_config(password))
        .map_err(|e| format!("error creating smart control client: {}", e))?;

    match cli.command.unwrap_or(Commands::Read) {
        Commands::Token => {
            let token = smart_control.get_access_token()?;
            match cli.output {
                OutputFormat::Plain => println!("{}", token.access_token),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "access_token": token.access_token,
                        "source": format!("{:?}", token.source),
                    }))?
                ),
            }
        }
        Commands::Power => {
            let watts = smart_control.get_power()?;
            match cli.output {
                OutputFormat::Plain => println!("{watts}"),
                OutputFormat::Json => println!("{}", json!({ "watts": watts })),
            }
        }
        Commands::Energy => {
            let kwh = smart_control.get_energy()?;
            match cli.output {
                OutputFormat::Plain => println!("{kwh}"),
                OutputFormat::Json => println!("{}", json!({ "kwh": kwh })),
            }
        }
        Commands::Read => {
            let watts = smart_control.get_power()?;
            let kwh = smart_control.get_energy()?;
            match cli.output {
                OutputFormat::Plain => {
                    println!("{watts}");
                    println!("{kwh}");
                }
                OutputFormat::Json => println!("{}", json!({ "watts": watts, "kwh": kwh })),
            }
        }
    }

    Ok(())
}
