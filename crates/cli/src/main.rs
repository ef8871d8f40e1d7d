use anyhow::Context;
use bookshelf_app::summation::Method;
use bookshelf_kernel::settings::Settings;
use clap::{Parser, Subcommand, ValueEnum};

/// Book catalog service and companion tools.
#[derive(Parser, Debug)]
#[command(name = "bookshelf", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service until Ctrl-C or SIGTERM
    Serve,
    /// Print the resolved configuration as JSON
    Config,
    /// Sum the integers 1..=n
    Sum {
        /// Upper bound, at least 1
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        n: u64,

        #[arg(short, long, value_enum, default_value_t = SumMethod::All)]
        method: SumMethod,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SumMethod {
    Formula,
    Iterative,
    Recursive,
    All,
}

impl SumMethod {
    fn methods(self) -> Vec<Method> {
        match self {
            SumMethod::Formula => vec![Method::Formula],
            SumMethod::Iterative => vec![Method::Iterative],
            SumMethod::Recursive => vec![Method::Recursive],
            SumMethod::All => Method::ALL.to_vec(),
        }
    }
}

fn load_settings() -> anyhow::Result<Settings> {
    Settings::load().context("failed to load bookshelf settings")
}

fn sum(n: u64, method: SumMethod) -> anyhow::Result<()> {
    for method in method.methods() {
        match method.sum(n) {
            Some(total) => println!("{}: {}", method.name(), total),
            None => println!("{}: overflow", method.name()),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => bookshelf_app::run(load_settings()?).await,
        Command::Config => {
            let settings = load_settings()?;
            bookshelf_telemetry::init(&settings.telemetry)?;
            tracing::debug!(environment = settings.environment.as_str(), "printing configuration");
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Command::Sum { n, method } => sum(n, method),
    }
}
