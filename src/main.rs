fn main() -> anyhow::Result<()> {
    ringside::run()
}
