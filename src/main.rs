fn main() {
    if let Err(e) = trustpack::cli::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
