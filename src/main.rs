fn main() -> anyhow::Result<()> {
    pl_cli::run()
}
