use clap::Parser;
use eventdesk_cli::cli_args::Cli;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = eventdesk_cli::run(cli) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
