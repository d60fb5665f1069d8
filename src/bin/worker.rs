use anyhow::Result;

fn main() -> Result<()> {
    invokebox::cli::run(invokebox::cli::CliMode::Worker)
}
