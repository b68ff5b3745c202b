use clap::Parser;
use std::path::PathBuf;
use tsdl_engine::ProxyKind;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Download and decrypt segmented media playlists",
    long_about = "Downloads every segment of an HLS media playlist (or a JSON segment list),\n\
                  decrypts AES-128 segments, and writes them in playlist order into a single\n\
                  output file. Segments are fetched in fixed-size concurrent batches; each\n\
                  batch gets a limited number of retry rounds."
)]
pub struct CliArgs {
    /// Playlist to download
    #[arg(
        required = true,
        help = "Path or http(s) URL of an M3U8 media playlist, or a path to a JSON segment list"
    )]
    pub input: String,

    /// Output file
    #[arg(
        short,
        long,
        help = "Output file (default: playlist name with a .ts extension in the current directory)"
    )]
    pub output: Option<PathBuf>,

    /// Base URL for relative segment and key locations
    #[arg(
        short,
        long,
        help = "Base URL used to resolve relative locations (default: the playlist URL when downloading one)"
    )]
    pub base_url: Option<String>,

    /// Segments fetched concurrently per batch
    #[arg(
        short,
        long,
        default_value = "5",
        help = "Number of segments downloaded concurrently (also the batch size)"
    )]
    pub concurrency: usize,

    /// Retry rounds per batch
    #[arg(
        short,
        long,
        default_value = "5",
        help = "Number of retry rounds each batch gets before the download fails"
    )]
    pub retries: usize,

    /// Request timeout in seconds
    #[arg(
        long,
        help = "Timeout in seconds for each request (default: none, or 10 when a proxy is used; 0 disables)"
    )]
    pub timeout: Option<u64>,

    /// Connection timeout in seconds
    #[arg(long, help = "Connection timeout in seconds")]
    pub connect_timeout: Option<u64>,

    /// Proxy address (host:port)
    #[arg(long, help = "Proxy server address, e.g. \"127.0.0.1:1080\"")]
    pub proxy: Option<String>,

    /// Proxy type
    #[arg(long, value_enum, default_value = "http", help = "Proxy type")]
    pub proxy_type: ProxyKind,

    /// Proxy username
    #[arg(long, help = "Username for proxy authentication")]
    pub proxy_user: Option<String>,

    /// Proxy password
    #[arg(long, help = "Password for proxy authentication")]
    pub proxy_pass: Option<String>,

    /// User agent override
    #[arg(long, help = "User-Agent header sent with every request")]
    pub user_agent: Option<String>,

    /// Custom HTTP headers for download requests
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// Overwrite an existing output file without asking
    #[arg(short = 'y', long, help = "Overwrite the output file if it already exists")]
    pub yes: bool,

    /// Show a progress bar
    #[arg(short = 'P', long = "progress", help = "Show a progress bar")]
    pub show_progress: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,
}
