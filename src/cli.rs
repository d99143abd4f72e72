// Command-line entry point for the patch-apply workflow.
//
// Locates a source image, polls the release catalog for the newest patch,
// reshapes the source if it's in a known compressed container, decodes the
// patch against it, and writes the result -- the same sequence the original
// updater walked through, minus the subprocess dependency on an external
// xdelta binary.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use crate::orchestrator::reshape::ContainerFormat;
use crate::orchestrator::{CatalogClient, OrchestratorError, State, identify_image, reshape};

const DEFAULT_CATALOG_URL: &str = "https://api.github.com/repos/example/releases/releases";
const DEFAULT_DATA_DIR: &str = "data";

/// Apply the newest catalog patch to a source disc image.
#[derive(Parser, Debug)]
#[command(
    name = "deltapatch",
    version,
    about = "Fetch and apply the newest VCDIFF patch to a source image"
)]
struct Cli {
    /// Path to the source image. If omitted, a previously remembered path is
    /// used, or the current directory is searched, or the user is prompted.
    #[arg(long, short = 's', value_hint = clap::ValueHint::FilePath)]
    source: Option<PathBuf>,

    /// Output path for the patched image.
    #[arg(long, short = 'o', default_value = "output.iso", value_hint = clap::ValueHint::FilePath)]
    output: PathBuf,

    /// Releases catalog URL to poll.
    #[arg(long, default_value = DEFAULT_CATALOG_URL)]
    catalog_url: String,

    /// Directory for persisted state (last-applied version, remembered source path).
    #[arg(long, default_value = DEFAULT_DATA_DIR, value_hint = clap::ValueHint::DirPath)]
    data_dir: PathBuf,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

pub fn run() -> ! {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();
    let exit_code = match apply(&cli) {
        Ok(AlreadyUpToDate::Yes) => {
            if !cli.quiet {
                println!("Already on the latest version.");
            }
            0
        }
        Ok(AlreadyUpToDate::No(version, path)) => {
            if !cli.quiet {
                println!("Applied patch {version}. Saved to {}", path.display());
            }
            0
        }
        Err(e) => {
            eprintln!("deltapatch: {e}");
            1
        }
    };
    process::exit(exit_code);
}

enum AlreadyUpToDate {
    Yes,
    No(String, PathBuf),
}

fn apply(cli: &Cli) -> Result<AlreadyUpToDate, OrchestratorError> {
    let mut state = State::load(&cli.data_dir)?;

    let source_path = locate_source_image(cli, &state)?;
    log::info!("using source image {}", source_path.display());

    let catalog = CatalogClient::new(cli.catalog_url.clone());
    let release = catalog.latest_release()?;

    if state.current_version.as_deref() == Some(release.name.as_str()) {
        log::info!("already on latest version: {}", release.name);
        return Ok(AlreadyUpToDate::Yes);
    }

    let patch_path = cli.data_dir.join("patch");
    catalog.download_patch(&release, &patch_path)?;

    let apply_result = crate::io::apply_patch(&source_path, &patch_path, &cli.output);
    // A failed patch should not leave a stale patch file lying around.
    let _ = std::fs::remove_file(&patch_path);
    let stats = apply_result?;
    log::info!(
        "applied patch: {} windows, {} bytes written",
        stats.windows,
        stats.output_size
    );

    state.current_version = Some(release.name.clone());
    state.source_image_path = Some(source_path);
    state.save(&cli.data_dir)?;

    Ok(AlreadyUpToDate::No(release.name, cli.output.clone()))
}

/// Resolve the source image path: explicit flag, then remembered state, then
/// a recursive search of the current directory, then an interactive prompt.
/// Any candidate in a known compressed container is reshaped into a
/// canonical raw image before being handed back.
fn locate_source_image(cli: &Cli, state: &State) -> Result<PathBuf, OrchestratorError> {
    if let Some(path) = &cli.source {
        return prepare_source(path, &cli.data_dir);
    }
    if let Some(path) = &state.source_image_path
        && path.exists()
    {
        return Ok(path.clone());
    }
    if let Some(found) = search_current_dir()? {
        return prepare_source(&found, &cli.data_dir);
    }
    prompt_for_source(&cli.data_dir)
}

fn search_current_dir() -> Result<Option<PathBuf>, OrchestratorError> {
    for entry in std::fs::read_dir(".")? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && identify_image(&path).is_ok() {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn prompt_for_source(data_dir: &Path) -> Result<PathBuf, OrchestratorError> {
    loop {
        println!("A known-good source image could not be found automatically.");
        print!("Enter the path to your source image: ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().lock().read_line(&mut input)?;
        let candidate = PathBuf::from(input.trim());
        if !candidate.exists() {
            println!("No such file: {}", candidate.display());
            continue;
        }
        match prepare_source(&candidate, data_dir) {
            Ok(path) => return Ok(path),
            Err(e) => println!("{} is not a recognized source image: {e}", candidate.display()),
        }
    }
}

/// Reshape `candidate` into the canonical raw image if its extension marks
/// it as a known compressed container, then verify it against the profile
/// table.
fn prepare_source(candidate: &Path, data_dir: &Path) -> Result<PathBuf, OrchestratorError> {
    let format = detect_format(candidate);
    let path = match format {
        ContainerFormat::Iso => candidate.to_path_buf(),
        ContainerFormat::Ciso => {
            let out = data_dir.join("reshaped.iso");
            reshape::ciso_to_iso(candidate, &out)?;
            out
        }
        ContainerFormat::NkitIso => {
            let out = data_dir.join("reshaped.iso");
            reshape::nkit_to_iso(candidate, &out)?;
            out
        }
    };

    identify_image(&path)?;
    Ok(path)
}

fn detect_format(path: &Path) -> ContainerFormat {
    let name = path.to_string_lossy().to_lowercase();
    if name.ends_with(".nkit.iso") {
        ContainerFormat::NkitIso
    } else if name.ends_with(".ciso") {
        ContainerFormat::Ciso
    } else {
        ContainerFormat::Iso
    }
}


#[doc(hidden)]
#[cfg(feature = "fuzzing")]
pub fn fuzz_try_parse_args(args: &[String]) {
    let _ = Cli::try_parse_from(args);
}
