use crate::demo::{run_demo, run_rules, run_window, DemoArgs, WindowArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use rollcall::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "rollcall",
    about = "Run and explore the rollcall attendance admission service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a sample event through check-ins, sign-outs, absences, and reports
    Demo(DemoArgs),
    /// Print the lateness penalty table
    Rules,
    /// Show the sign-in/sign-out windows of a schedule and classify an instant
    Window(WindowArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Rules => run_rules(),
        Command::Window(args) => run_window(args),
    }
}
