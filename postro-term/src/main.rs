use postro_term::{cli::Cli, mainloop::EXIT_FAILURE, startup};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_env("POSTRO_LOG"))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = match Cli::parse_args() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            eprintln!("Try \"postro-term --help\" for more information.");
            std::process::exit(EXIT_FAILURE);
        }
    };

    std::process::exit(startup::run(cli));
}
