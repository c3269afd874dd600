fn main() -> std::process::ExitCode {
    canvas_share_lib::run()
}
