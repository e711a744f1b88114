use clap::Parser;
use hpitrack::cli::Cli;
use hpitrack::telemetry;

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("hpitrack=info");
    let cli = Cli::parse();
    cli.run()
}
