fn main() {
    if let Err(err) = svg2vd::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
