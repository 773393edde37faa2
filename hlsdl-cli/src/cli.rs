use clap::Parser;
use hlsdl_engine::HlsDownloadConfig;
use hlsdl_engine::config::{DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_DIR};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "hlsdl",
    version,
    about = "Download an HLS (m3u8) playlist and its segments, and serve them over HTTP"
)]
pub struct Args {
    /// m3u8 download address
    #[arg(short = 'd', long = "download", value_name = "URL")]
    pub download: Option<String>,

    /// Output (download) directory
    #[arg(short = 'o', long = "output", value_name = "DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Download thread limit
    #[arg(
        short = 't',
        long = "thread",
        value_name = "N",
        default_value_t = DEFAULT_CONCURRENCY,
        value_parser = parse_thread_limit
    )]
    pub thread: usize,

    /// Force download even if file already exists
    #[arg(short = 'f', long = "force-download")]
    pub force_download: bool,

    /// HTTP server listen address
    #[arg(short = 'l', long = "listen", value_name = "ADDR", default_value = ":8000")]
    pub listen: String,

    /// Use the working directory instead of the executable directory
    #[arg(short = 'w', long = "use-working-dir")]
    pub use_working_dir: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

fn parse_thread_limit(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("thread limit must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Args {
    pub fn download_config(&self) -> HlsDownloadConfig {
        HlsDownloadConfig::builder()
            .with_output_dir(&self.output)
            .with_concurrency(self.thread)
            .with_force_download(self.force_download)
            .build()
    }
}
