fn main() {
    if let Err(err) = mobpack::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
