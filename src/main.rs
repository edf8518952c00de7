use imgdups::{commands, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::with_config()?;
    commands::run_app(&cli)
}
