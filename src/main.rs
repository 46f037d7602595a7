fn main() -> anyhow::Result<()> {
    discharge_docs_lib::run()
}
