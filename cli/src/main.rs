use anyhow::Result;

fn main() -> Result<()> {
    quince_cli::run()
}
