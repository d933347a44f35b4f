fn main() {
    if let Err(e) = twmt_mod_sync_lib::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
