use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spectra-meter", about = "Live microphone band meter")]
pub struct Cli {
    /// Pipeline config (JSON); defaults apply when omitted
    pub config: Option<PathBuf>,

    /// Capture from this input device instead of the default
    #[arg(long)]
    pub device: Option<String>,

    /// List input devices and exit
    #[arg(long)]
    pub list_devices: bool,
}
