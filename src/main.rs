fn main() {
    if let Err(err) = adm_datamart::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
