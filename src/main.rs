fn main() {
    if let Err(err) = flowtree::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
