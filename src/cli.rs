use clap::{Parser, Subcommand, ValueEnum};
use cvr_lib::Viewport;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cvr")]
#[command(
    version,
    about = "Canvas Visual Review - spec-driven design review for live web pages",
    long_about = "Canvas Visual Review (CVR)\n\nModes:\n- review: drive a headless browser against a URL and run a design spec's checks.\n- compare: diff a live page against a reference image (pixel + SSIM).\n- validate-spec: load and resolve a spec without touching a browser.\n\nUse --help on any subcommand for details."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose progress output")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) for viewport/thresholds/timeouts; CLI flags override config"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Review a URL against a design spec
    Review {
        #[arg(long, help = "URL to review (http, https, or file)")]
        url: String,

        #[arg(long, help = "Spec id or path (searched in spec roots)")]
        spec: String,

        #[arg(long, help = "CSS selector to scope the review to a subtree")]
        scope: Option<String>,

        #[arg(long, help = "Render annotated.png with numbered issue markers")]
        annotate: bool,

        #[arg(long, help = "Return the compact, token-lean result shape")]
        compact: bool,

        #[arg(long, help = "Write tasks.md listing manual-review checks")]
        tasks: bool,

        #[arg(long, help = "Write issues.md with the full issue list")]
        markdown: bool,

        #[arg(long, value_name = "ID", help = "Explicit session id (directory name)")]
        session_id: Option<String>,

        #[arg(long, value_name = "WIDTHxHEIGHT", help = "Viewport dimensions")]
        viewport: Option<Viewport>,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,

        #[arg(long, value_name = "PATH", help = "Sessions root directory")]
        sessions_dir: Option<PathBuf>,

        #[arg(long, value_name = "SECS", help = "Navigation timeout in seconds")]
        nav_timeout: Option<u64>,
    },

    /// Compare a URL against a reference image
    Compare {
        #[arg(long, help = "URL to capture (http, https, or file)")]
        url: String,

        #[arg(long, help = "Reference image (PNG/JPEG/WebP)")]
        reference: PathBuf,

        #[arg(long, help = "Pixel diff threshold, percent changed (default 5.0)")]
        pixel_threshold: Option<f64>,

        #[arg(long, help = "SSIM threshold in 0..1 (default 0.95)")]
        ssim_threshold: Option<f64>,

        #[arg(long, value_enum, default_value = "hybrid", help = "Comparison method")]
        method: MethodArg,

        #[arg(long, value_enum, default_value = "overlay", help = "diff.png style")]
        diff_style: DiffStyleArg,

        #[arg(long, help = "Capture only the viewport instead of the full page")]
        viewport_only: bool,

        #[arg(
            long,
            value_name = "PATH",
            help = "JSON array of {x,y,width,height} regions to mask before diffing (px or 0-1 normalized; w/h aliases allowed)"
        )]
        ignore_regions: Option<PathBuf>,

        #[arg(long, value_name = "ID", help = "Explicit session id (directory name)")]
        session_id: Option<String>,

        #[arg(long, value_name = "WIDTHxHEIGHT", help = "Viewport dimensions")]
        viewport: Option<Viewport>,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,

        #[arg(long, value_name = "PATH", help = "Sessions root directory")]
        sessions_dir: Option<PathBuf>,

        #[arg(long, value_name = "SECS", help = "Navigation timeout in seconds")]
        nav_timeout: Option<u64>,
    },

    /// Load and resolve a spec; exit non-zero on parse or cycle errors
    ValidateSpec {
        #[arg(long, help = "Spec id or path (searched in spec roots)")]
        spec: String,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Pixel,
    Ssim,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiffStyleArg {
    Overlay,
    Sidebyside,
    Heatmap,
}

pub fn parse() -> Cli {
    Cli::parse()
}
