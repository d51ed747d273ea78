fn main() -> anyhow::Result<()> {
    reactime_cli::run()
}
