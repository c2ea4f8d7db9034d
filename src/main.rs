fn main() {
    if let Err(err) = irs_trend::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
