use crate::config::Config;

#[derive(clap::Parser)]
pub struct Cmd {
    /// Print as JSON instead of the debug representation
    #[clap(long)]
    json: bool,
}

impl Cmd {
    pub fn run(self, config: &Config) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            println!("{config:#?}");
        }

        if !config.has_drivers() {
            eprintln!("No drivers are configured.");
        }

        Ok(())
    }
}
