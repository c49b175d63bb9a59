use ks_core::KmlError;
use ks_session::JobConfig;
use ks_session::KmlSource;
use ks_session::Loader;
use ks_session::run_job_with;
use ks_style::StyleColor;
use ks_storage::KmlStore;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: kmlstyle [--config <file.json>] [--dry-run] [<input>] [<output>]";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CliArgs {
    config: Option<PathBuf>,
    dry_run: bool,
    input: Option<String>,
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    install_logging();

    let args = match cli_args_from(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("kmlstyle: {message}");
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(code = error.code(), "{error}");
            eprintln!("kmlstyle: {}", describe_chain(&error));
            ExitCode::FAILURE
        }
    }
}

fn install_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cli_args_from(mut raw: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional = Vec::new();

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" => {
                let path = raw
                    .next()
                    .ok_or_else(|| "missing file path after --config".to_owned())?;
                args.config = Some(PathBuf::from(path));
            }
            "--dry-run" => args.dry_run = true,
            other if other.starts_with("--") => {
                return Err(format!("unsupported option `{other}`"));
            }
            _ => positional.push(arg),
        }
    }

    if positional.len() > 2 {
        return Err(format!("expected at most 2 positional arguments, got {}", positional.len()));
    }

    let mut positional = positional.into_iter();
    args.input = positional.next();
    args.output = positional.next().map(PathBuf::from);
    Ok(args)
}

fn job_from_args(args: &CliArgs) -> Result<JobConfig, KmlError> {
    let mut job = match &args.config {
        Some(path) => JobConfig::from_json_file(path)?,
        None => JobConfig::default(),
    };

    if let Some(input) = &args.input {
        job.input = input.clone();
    }
    if let Some(output) = &args.output {
        job.output = output.clone();
    }

    Ok(job)
}

fn run(args: &CliArgs) -> Result<(), KmlError> {
    let job = job_from_args(args)?;
    info!(
        input = %job.input,
        output = %job.output.display(),
        dry_run = args.dry_run,
        "starting KML style job"
    );

    let mut loader = Loader::new(KmlStore::new())?;
    let report = run_job_with(&mut loader, &job, !args.dry_run)?;

    if args.dry_run {
        for replaced in &report.replaced_colors {
            eprintln!("{}", describe_replaced(replaced));
        }
        println!("{}", report.output);
        return Ok(());
    }

    if let Some(path) = &report.written_to {
        println!(
            "Restyled {} style(s) from {}, linked {} placemark(s); wrote {}",
            report.style.containers,
            KmlSource::detect(&job.input).describe(),
            report.linked_placemarks,
            path.display()
        );
    }

    Ok(())
}

fn describe_replaced(replaced: &StyleColor) -> String {
    match replaced.color {
        Some(color) => format!(
            "replacing {} color {} ({}, alpha {})",
            replaced.block, replaced.raw, color.rgb, color.alpha
        ),
        None => format!(
            "replacing {} color `{}` (not a KML color)",
            replaced.block, replaced.raw
        ),
    }
}

fn describe_chain(error: &KmlError) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::CliArgs;
    use super::cli_args_from;
    use super::describe_replaced;
    use super::job_from_args;
    use ks_style::StyleColor;
    use std::path::PathBuf;

    fn parse(raw: &[&str]) -> Result<CliArgs, String> {
        cli_args_from(raw.iter().map(|arg| (*arg).to_owned()))
    }

    #[test]
    fn no_arguments_runs_the_stock_job() {
        let args = parse(&[]);
        assert_eq!(args, Ok(CliArgs::default()));

        let job = match args.map(|args| job_from_args(&args)) {
            Ok(Ok(job)) => job,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(job.input, "SMC.kml");
        assert_eq!(job.output, PathBuf::from("modified.kml"));
    }

    #[test]
    fn positional_and_flags_mix() {
        let args = parse(&["--dry-run", "https://example.com/a.kml", "out/b.kml"]);
        assert_eq!(
            args,
            Ok(CliArgs {
                config: None,
                dry_run: true,
                input: Some("https://example.com/a.kml".to_owned()),
                output: Some(PathBuf::from("out/b.kml")),
            })
        );
    }

    #[test]
    fn rejects_bad_usage() {
        assert!(parse(&["--config"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
        assert!(parse(&["a.kml", "b.kml", "c.kml"]).is_err());
    }

    #[test]
    fn dry_run_lines_decode_replaced_colors() {
        let color = match ks_color::KmlColor::parse_kml("80A32999") {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };
        let decoded = StyleColor {
            block: "LineStyle",
            raw: "80A32999".to_owned(),
            color: Some(color),
        };
        assert_eq!(
            describe_replaced(&decoded),
            "replacing LineStyle color 80A32999 (#9929A3, alpha 128)"
        );

        let opaque = StyleColor {
            block: "PolyStyle",
            raw: "blue".to_owned(),
            color: None,
        };
        assert_eq!(
            describe_replaced(&opaque),
            "replacing PolyStyle color `blue` (not a KML color)"
        );
    }
}
