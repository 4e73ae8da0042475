fn main() -> anyhow::Result<()> {
    spotlet::run()
}
