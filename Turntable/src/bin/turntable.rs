fn main() -> anyhow::Result<()> {
    turntable::cli::run_cli()
}
