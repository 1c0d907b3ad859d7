use clap::Parser;

fn main() {
    let cli = revlensctl::Cli::parse();
    if let Err(err) = revlensctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
