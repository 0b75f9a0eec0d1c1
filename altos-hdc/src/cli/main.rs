use altos_hdc::{run_script, Board, ChannelIop, Controller, DriveModel, Geometry, ImageFile,
                Storage, VecMemory, DRIVE_MODELS};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser, ValueEnum};
use log::info;
use simplelog::{ConfigBuilder, LevelFilter, LevelPadding, WriteLogger};
use std::fs::{self, File};
use std::sync::mpsc;

const LOG_PATH: &str = "log-path";
const LOG_LEVEL: &str = "log-level";
const IMAGE_PATH: &str = "IMAGE";
const MODEL: &str = "model";
const HEADS: &str = "heads";
const CYLINDERS: &str = "cylinders";
const SECTORS: &str = "sectors";
const SCRIPT_PATH: &str = "SCRIPT";
const DRIVE_0_PATH: &str = "drive0";
const DRIVE_1_PATH: &str = "drive1";

/// Host memory behind the I/O processor's memory window: the whole 8086
/// address space.
const HOST_MEMORY_SIZE: usize = 1 << 20;

/// Possible log levels.
#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
}

fn cli() -> Command {
    // Hack to make the build dirty when the toml changes.
    include_str!("../../Cargo.toml");

    clap::command!()
        .max_term_width(100)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .after_help("\
Disk images carry a small header describing their geometry, so they only \
need to be described once, at creation. Scripts drive the controller's \
registers the way the I/O processor would; see the README for the syntax.")
        .arg(Arg::new(LOG_PATH)
            .help("If set, a debug log will be written to the given path.")
            .short('l')
            .long("log")
            .action(ArgAction::Set)
            .global(true))
        .arg(Arg::new(LOG_LEVEL)
            .help("Set the log level. Has no effect without \
                   specifying --log as well. Case insensitive.")
            .short('L')
            .long("log-level")
            .action(ArgAction::Set)
            .value_parser(value_parser!(LogLevel))
            .default_value("trace")
            .ignore_case(true)
            .global(true))
        .subcommand(Command::new("create")
            .about("Create a zero-filled disk image.")
            .arg(Arg::new(IMAGE_PATH)
                .help("Where to create the image. Must not already exist.")
                .action(ArgAction::Set)
                .required(true))
            .arg(Arg::new(MODEL)
                .help("A drive model to take the geometry from.")
                .short('m')
                .long("model")
                .action(ArgAction::Set)
                .conflicts_with_all([HEADS, CYLINDERS, SECTORS]))
            .arg(Arg::new(HEADS)
                .help("Number of heads.")
                .long("heads")
                .action(ArgAction::Set)
                .value_parser(value_parser!(u16).range(1..=16))
                .required_unless_present(MODEL))
            .arg(Arg::new(CYLINDERS)
                .help("Number of cylinders.")
                .long("cylinders")
                .action(ArgAction::Set)
                .value_parser(value_parser!(u16).range(1..=2048))
                .required_unless_present(MODEL))
            .arg(Arg::new(SECTORS)
                .help("Number of sectors per track.")
                .long("sectors")
                .action(ArgAction::Set)
                .value_parser(value_parser!(u16).range(1..=256))
                .default_value("16")))
        .subcommand(Command::new("info")
            .about("Describe a disk image.")
            .arg(Arg::new(IMAGE_PATH)
                .help("The image to describe.")
                .action(ArgAction::Set)
                .required(true)))
        .subcommand(Command::new("run")
            .about("Run a bus script against a controller with the given drives.")
            .arg(Arg::new(SCRIPT_PATH)
                .help("The script to run.")
                .action(ArgAction::Set)
                .required(true))
            .arg(Arg::new(DRIVE_0_PATH)
                .help("Image to attach as drive 0. Left empty if omitted.")
                .long("drive0")
                .action(ArgAction::Set))
            .arg(Arg::new(DRIVE_1_PATH)
                .help("Image to attach as drive 1. Left empty if omitted.")
                .long("drive1")
                .action(ArgAction::Set)))
}

/// Initialise logging to the given file.
fn init_logging(logfile: File, level: LevelFilter) -> Result<(), String> {
    let config = ConfigBuilder::new()
        .set_level_padding(LevelPadding::Right)
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_time_format_custom(time::macros::format_description!(
            "[hour]:[minute]:[second].[subsecond digits:6]"))
        .build();

    WriteLogger::init(level, config, logfile)
        .map_err(|e| format!("Failed to initialise logging: {}", e))
}

/// Work out which model, if any, an image's geometry belongs to.
fn model_of(geometry: &Geometry) -> Option<&'static DriveModel> {
    DRIVE_MODELS.iter().find(|model| model.geometry() == *geometry)
}

fn create(args: &ArgMatches) -> Result<(), String> {
    let path = args.get_one::<String>(IMAGE_PATH).unwrap();
    let geometry = match args.get_one::<String>(MODEL) {
        Some(name) => match DriveModel::by_name(name) {
            Some(model) => model.geometry(),
            None => {
                let known: Vec<&str> = DRIVE_MODELS.iter().map(|m| m.name).collect();
                return Err(format!("Unknown drive model '{}'. Known models: {}.",
                                   name, known.join(", ")));
            }
        },
        None => Geometry {
            sectors_per_track: *args.get_one::<u16>(SECTORS).unwrap(),
            ..Geometry::native(*args.get_one::<u16>(HEADS).unwrap(),
                               *args.get_one::<u16>(CYLINDERS).unwrap())
        },
    };

    ImageFile::create(path, geometry)
        .map_err(|e| format!("Failed to create image '{}': {}", path, e))?;
    println!("Created '{}': {}", path, geometry);
    Ok(())
}

fn describe(args: &ArgMatches) -> Result<(), String> {
    let path = args.get_one::<String>(IMAGE_PATH).unwrap();
    let image = ImageFile::open(path)
        .map_err(|e| format!("Failed to open image '{}': {}", path, e))?;
    let geometry = image.geometry()
        .ok_or_else(|| format!("Image '{}' has no geometry.", path))?;

    println!("{}: {}", image.path().display(), geometry);
    match model_of(&geometry) {
        Some(model) => println!("Drive model: {}", model.name),
        None => println!("Drive model: none (non-standard geometry)"),
    }
    println!("Sectors: {}", geometry.total_sectors());
    Ok(())
}

fn open_drive(args: &ArgMatches, id: &str) -> Result<Option<ImageFile>, String> {
    match args.get_one::<String>(id) {
        Some(path) => ImageFile::open(path)
            .map(Some)
            .map_err(|e| format!("Failed to open image '{}': {}", path, e)),
        None => Ok(None),
    }
}

fn run_bus_script(args: &ArgMatches) -> Result<(), String> {
    let script_path = args.get_one::<String>(SCRIPT_PATH).unwrap();
    let source = fs::read_to_string(script_path)
        .map_err(|e| format!("Failed to read script '{}': {}", script_path, e))?;
    let drive_0 = open_drive(args, DRIVE_0_PATH)?;
    let drive_1 = open_drive(args, DRIVE_1_PATH)?;

    // Build the board.
    let (signal_tx, signal_rx) = mpsc::channel();
    let controller = Controller::new(ChannelIop::new(signal_tx), drive_0, drive_1);
    let mut board = Board::new(controller, VecMemory::new(HOST_MEMORY_SIZE))
        .map_err(|e| e.to_string())?;
    // Don't report the power-on reset.
    signal_rx.try_iter().for_each(drop);

    info!("Running script '{}'.", script_path);
    let result = run_script(&source, &mut board, &signal_rx);
    for diagnostic in board.controller_mut().take_diagnostics() {
        eprintln!("Warning: {}", diagnostic);
    }
    let transcript = result.map_err(|e| format!("Script '{}' failed at {}", script_path, e))?;
    for line in transcript {
        println!("{}", line);
    }
    Ok(())
}

/// Main run function; returns an exit code.
fn run(args: ArgMatches) -> u8 {
    return match _run(args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    fn _run(args: ArgMatches) -> Result<(), String> {
        let (name, sub) = match args.subcommand() {
            Some(subcommand) => subcommand,
            None => return Err("No subcommand given.".to_string()),
        };

        // Initialise logging if configured.
        if let Some(log_path) = sub.get_one::<String>(LOG_PATH) {
            match File::create(log_path) {
                Ok(logfile) => {
                    let level = match sub.get_one::<LogLevel>(LOG_LEVEL) {
                        Some(LogLevel::Debug) => LevelFilter::Debug,
                        Some(LogLevel::Info) => LevelFilter::Info,
                        _ => LevelFilter::Trace,
                    };
                    init_logging(logfile, level)?;
                },
                Err(e) => return Err(
                    format!("Failed to create log file: {}", e)),
            }
        }

        match name {
            "create" => create(sub),
            "info" => describe(sub),
            "run" => run_bus_script(sub),
            _ => unreachable!(),
        }
    }
}

fn main() {
    let args = cli().get_matches();
    std::process::exit(run(args).into());
}

#[cfg(test)]
mod tests {
    use super::*;

    use altos_hdc::SECTOR_BYTES;
    use std::fs;
    use tempfile;

    macro_rules! invoke {
        ($($args:expr),+) => {{
            let args = cli().try_get_matches_from(
                    vec!["hdc".to_string(), $($args.to_string()),*])
                .unwrap();
            run(args)
        }}
    }

    #[test]
    fn test_create_model() {
        let tempdir = tempfile::tempdir().unwrap();
        let image = tempdir.path().join("acs20.img");
        let image = image.to_str().unwrap();
        assert_eq!(invoke!("create", image, "--model", "acs586-20"), 0);
        let image = ImageFile::open(image).unwrap();
        assert_eq!(image.geometry(), Some(Geometry::native(6, 306)));
        assert_eq!(model_of(&Geometry::native(6, 306)).unwrap().name, "ACS586-20");
    }

    #[test]
    fn test_create_geometry() {
        let tempdir = tempfile::tempdir().unwrap();
        let image = tempdir.path().join("odd.img");
        let image = image.to_str().unwrap();
        assert_eq!(invoke!("create", image, "--heads", "2", "--cylinders", "10",
                           "--sectors", "17"), 0);
        let geometry = ImageFile::open(image).unwrap().geometry().unwrap();
        assert_eq!(geometry.total_sectors(), 2 * 10 * 17);
        assert!(model_of(&geometry).is_none());
        assert_eq!(invoke!("info", image), 0);
    }

    #[test]
    fn test_create_failures() {
        let tempdir = tempfile::tempdir().unwrap();
        let image = tempdir.path().join("drive.img");
        let image = image.to_str().unwrap();
        assert_eq!(invoke!("create", image, "--model", "ST-506"), 1);
        assert!(fs::metadata(image).is_err());

        assert_eq!(invoke!("create", image, "--model", "HH-20MB"), 0);
        // Never clobber an existing image.
        assert_eq!(invoke!("create", image, "--model", "ACS586-10"), 1);
        assert_eq!(ImageFile::open(image).unwrap().geometry(),
                   Some(Geometry::native(4, 612)));
    }

    #[test]
    fn test_bad_command_lines() {
        let parse = |args: &[&str]| {
            let mut full = vec!["hdc"];
            full.extend_from_slice(args);
            cli().try_get_matches_from(full)
        };
        assert!(parse(&[]).is_err());
        assert!(parse(&["create", "x.img"]).is_err());
        assert!(parse(&["create", "x.img", "--heads", "4"]).is_err());
        assert!(parse(&["create", "x.img", "--model", "HH-20MB", "--heads", "4"]).is_err());
        assert!(parse(&["create", "x.img", "--heads", "0", "--cylinders", "1"]).is_err());
        assert!(parse(&["info", "x.img", "--log-level", "loud"]).is_err());
        assert!(parse(&["info", "x.img", "--log-level", "DEBUG"]).is_ok());
    }

    #[test]
    fn test_info_missing() {
        let tempdir = tempfile::tempdir().unwrap();
        let image = tempdir.path().join("missing.img");
        assert_eq!(invoke!("info", image.to_str().unwrap()), 1);
    }

    #[test]
    fn test_run_script() {
        let tempdir = tempfile::tempdir().unwrap();
        let image = tempdir.path().join("drive0.img");
        let image = image.to_str().unwrap();
        let script = tempdir.path().join("write.hdc");
        fs::write(&script, "\
# Write 0x5A over CHS 10/2/5.
out head 0x12
out cylinder 10
out cylinder 0
out data 0 x 2
out command 0x10
out data 5
out command 0x02
out data 0x5A x 512
expect status 0x80
").unwrap();

        assert_eq!(invoke!("create", image, "--model", "ACS586-10"), 0);
        assert_eq!(invoke!("run", script.to_str().unwrap(), "--drive0", image), 0);

        let mut image = ImageFile::open(image).unwrap();
        let mut sector = [0; SECTOR_BYTES];
        image.read(677, &mut sector).unwrap();
        assert_eq!(sector, [0x5A; SECTOR_BYTES]);
    }

    /// The sample scripts should run cleanly against a fresh drive.
    #[test]
    fn test_sample_scripts() {
        let tempdir = tempfile::tempdir().unwrap();
        let image = tempdir.path().join("drive0.img");
        let image = image.to_str().unwrap();
        assert_eq!(invoke!("create", image, "--model", "ACS586-10"), 0);
        assert_eq!(invoke!("run", "scripts/write-read.hdc", "--drive0", image), 0);
        assert_eq!(invoke!("run", "scripts/format-track.hdc", "--drive0", image), 0);

        let mut image = ImageFile::open(image).unwrap();
        let mut sector = [0; SECTOR_BYTES];
        image.read((3 * 4 + 1) * 16 + 1, &mut sector).unwrap();
        assert_eq!(sector, [0xE5; SECTOR_BYTES]);
    }

    #[test]
    fn test_run_failures() {
        let tempdir = tempfile::tempdir().unwrap();
        let script = tempdir.path().join("empty-drive.hdc");
        // No drive attached, so the select can't succeed.
        fs::write(&script, "out head 0x10\nexpect status 0x80\n").unwrap();
        let script = script.to_str().unwrap();
        assert_eq!(invoke!("run", script), 1);

        let missing = tempdir.path().join("missing.img");
        assert_eq!(invoke!("run", script, "--drive0", missing.to_str().unwrap()), 1);

        let missing = tempdir.path().join("missing.hdc");
        assert_eq!(invoke!("run", missing.to_str().unwrap()), 1);
    }
}
