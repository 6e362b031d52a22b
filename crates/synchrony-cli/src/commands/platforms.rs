use anyhow::Result;
use clap::Args;

use synchrony_sync::backends::list_supported_platforms;

use crate::output::{Output, OutputFormat};

#[derive(Debug, Args)]
pub struct PlatformsCommand {}

impl PlatformsCommand {
    pub fn execute(&self, format: OutputFormat) -> Result<()> {
        let output = Output::new(format);
        let platforms = list_supported_platforms();
        output.document(&serde_json::json!({ "platforms": platforms }))?;
        if !output.is_json() {
            for platform in platforms {
                println!("{platform}");
            }
        }
        Ok(())
    }
}
