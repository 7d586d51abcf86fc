use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
pub struct Cli {
    /// Output directory for the image
    #[arg(long, short = 'O', default_value = ".")]
    pub out_dir: PathBuf,

    /// Host directory whose regular files are copied into the image root
    #[arg(long, short)]
    pub source: Option<PathBuf>,
}
