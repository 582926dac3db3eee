fn main() {
    let args: Vec<String> = std::env::args().collect();
    if let Err(err) = zonesim::run(&args) {
        eprintln!("zonesim: {}", err);
        std::process::exit(1);
    }
}
