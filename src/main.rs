fn main() -> std::process::ExitCode {
    qualtrics_sync::run()
}
