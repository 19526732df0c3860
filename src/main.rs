fn main() {
    if let Err(err) = file_viewer_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
