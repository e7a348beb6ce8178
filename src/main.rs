fn main() {
    if let Err(err) = viewgraph::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
