fn main() {
    if let Err(err) = dirsnap::cli::run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}
