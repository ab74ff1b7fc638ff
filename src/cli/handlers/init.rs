use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::config_io;

/// Create the data directory with a commented default config.
pub fn cmd_init(args: InitArgs, data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_io::write_default_config(data_dir, args.force)?;
    println!("Initialized shortcuts in {}", data_dir.display());
    println!("  config: {}", path.display());
    println!();
    println!("Attach a data file other programs can edit with: sc attach <path>");
    Ok(())
}
