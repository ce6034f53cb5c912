mod cli;
mod formatting;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use cli::{Commands, DiffStyleArg, MethodArg, OutputFormat};
use cvr_lib::compare::{CompareMethod, CompareParams, DiffStyle, IgnoreRegion};
use cvr_lib::config::load_config;
use cvr_lib::review::{CompareOptions, EngineOptions, ReviewEngine, ReviewOptions};
use cvr_lib::{CvrError, Viewport};
use formatting::{
    print_compare_pretty, print_review_pretty, print_validate_pretty, render_error, write_json,
};

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

async fn run() -> ExitCode {
    let args = cli::parse();
    let verbose = args.verbose;

    let config = match load_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => return render_error(err, OutputFormat::Json, None),
    };

    match args.command {
        Commands::Review {
            url,
            spec,
            scope,
            annotate,
            compact,
            tasks,
            markdown,
            session_id,
            viewport,
            format,
            output,
            sessions_dir,
            nav_timeout,
        } => {
            let engine = build_engine(
                &config,
                viewport,
                sessions_dir,
                nav_timeout,
                verbose,
            );
            let options = ReviewOptions {
                scope,
                annotate,
                compact,
                generate_tasks: tasks,
                generate_markdown: markdown,
                session_id,
            };

            match engine.review(&url, &spec, &options).await {
                Ok(result) => match format {
                    OutputFormat::Json => {
                        let write_result = if options.compact {
                            write_json(&result.compact(), output.as_deref())
                        } else {
                            write_json(&result, output.as_deref())
                        };
                        if let Err(err) = write_result {
                            return render_error(CvrError::Io(err), format, output);
                        }
                        ExitCode::SUCCESS
                    }
                    OutputFormat::Pretty => {
                        print_review_pretty(&result);
                        ExitCode::SUCCESS
                    }
                },
                Err(err) => render_error(err, format, output),
            }
        }

        Commands::Compare {
            url,
            reference,
            pixel_threshold,
            ssim_threshold,
            method,
            diff_style,
            viewport_only,
            ignore_regions,
            session_id,
            viewport,
            format,
            output,
            sessions_dir,
            nav_timeout,
        } => {
            let ignore_regions = match ignore_regions {
                Some(path) => match load_ignore_regions(&path) {
                    Ok(regions) => regions,
                    Err(err) => return render_error(err, format, output),
                },
                None => Vec::new(),
            };

            let engine = build_engine(
                &config,
                viewport,
                sessions_dir,
                nav_timeout,
                verbose,
            );
            let options = CompareOptions {
                params: CompareParams {
                    method: match method {
                        MethodArg::Pixel => CompareMethod::Pixel,
                        MethodArg::Ssim => CompareMethod::Ssim,
                        MethodArg::Hybrid => CompareMethod::Hybrid,
                    },
                    pixel_threshold: pixel_threshold.unwrap_or(config.thresholds.pixel),
                    ssim_threshold: ssim_threshold.unwrap_or(config.thresholds.ssim),
                    ignore_regions,
                },
                diff_style: match diff_style {
                    DiffStyleArg::Overlay => DiffStyle::Overlay,
                    DiffStyleArg::Sidebyside => DiffStyle::Sidebyside,
                    DiffStyleArg::Heatmap => DiffStyle::Heatmap,
                },
                viewport_only,
                session_id,
            };

            match engine.compare(&url, &reference, &options).await {
                Ok(outcome) => match format {
                    OutputFormat::Json => {
                        if let Err(err) = write_json(&outcome, output.as_deref()) {
                            return render_error(CvrError::Io(err), format, output);
                        }
                        ExitCode::SUCCESS
                    }
                    OutputFormat::Pretty => {
                        print_compare_pretty(&outcome);
                        ExitCode::SUCCESS
                    }
                },
                Err(err) => render_error(err, format, output),
            }
        }

        Commands::ValidateSpec {
            spec,
            format,
            output,
        } => {
            let engine = build_engine(&config, None, None, None, verbose);
            match engine.validate_spec(&spec) {
                Ok(result) => match format {
                    OutputFormat::Json => {
                        if let Err(err) = write_json(&result, output.as_deref()) {
                            return render_error(CvrError::Io(err), format, output);
                        }
                        ExitCode::SUCCESS
                    }
                    OutputFormat::Pretty => {
                        print_validate_pretty(&result);
                        ExitCode::SUCCESS
                    }
                },
                Err(err) => render_error(err, format, output),
            }
        }
    }
}

fn build_engine(
    config: &cvr_lib::config::Config,
    viewport: Option<Viewport>,
    sessions_dir: Option<PathBuf>,
    nav_timeout: Option<u64>,
    verbose: bool,
) -> ReviewEngine {
    let mut browser = config.browser_options();
    if let Some(viewport) = viewport {
        browser.viewport = viewport;
    }
    if let Some(secs) = nav_timeout {
        browser.navigation_timeout = Duration::from_secs(secs);
    }

    let engine = ReviewEngine::new(EngineOptions {
        browser,
        sessions_root: sessions_dir.unwrap_or_else(|| config.sessions_root.clone()),
        spec_roots: config.spec_roots.clone(),
    });

    if verbose {
        engine.with_progress(Arc::new(|msg: &str| eprintln!("{msg}")))
    } else {
        engine
    }
}

fn load_ignore_regions(path: &std::path::Path) -> Result<Vec<IgnoreRegion>, CvrError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| CvrError::Config(format!("cannot read ignore-regions: {e}")))?;
    let regions: Vec<IgnoreRegion> = serde_json::from_str(&data).map_err(|e| {
        CvrError::Config(format!(
            "invalid ignore-regions JSON (expected array of {{x,y,width,height}}): {e}"
        ))
    })?;
    if regions.is_empty() {
        return Err(CvrError::Config(
            "ignore-regions file contained no regions".to_string(),
        ));
    }
    Ok(regions)
}
