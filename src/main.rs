fn main() {
    if let Err(err) = packsmith::cli::run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
