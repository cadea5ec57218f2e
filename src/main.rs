fn main() {
    if let Err(err) = sales_import::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
