//! EEPROM image utility
//! Generates, inspects and edits module controller EEPROM files (.eep Intel HEX)

use anyhow::Context;
use bmu_eeprom::core::frame_counter::{self, SlotStatus};
use bmu_eeprom::core::validation::{self, ValidationMessage};
use bmu_eeprom::formats::{load_eep_with, save_eep, DecodeOptions, ImageReport};
use bmu_eeprom::{
    apply_edit, decode_metadata, encode_metadata, EepromImage, FieldEdit, FormatRevision,
    MetadataRecord,
};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt::format::FmtSpan, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "eeprom-tool")]
#[command(about = "Battery management unit EEPROM image tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StrictOption {
    /// Reject records with a bad checksum
    #[arg(long)]
    strict: bool,
}

impl StrictOption {
    fn decode_options(&self) -> DecodeOptions {
        if self.strict {
            DecodeOptions::strict()
        } else {
            DecodeOptions::default()
        }
    }
}

#[derive(Args)]
struct ReadOptions {
    /// Decode the metadata block using the legacy layout
    #[arg(long)]
    legacy: bool,

    #[command(flatten)]
    hex: StrictOption,
}

impl ReadOptions {
    fn revision(&self) -> FormatRevision {
        if self.legacy {
            FormatRevision::Legacy
        } else {
            FormatRevision::Framework
        }
    }

    fn decode_options(&self) -> DecodeOptions {
        self.hex.decode_options()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fresh EEPROM file from module parameters
    Generate {
        /// Module controller's ID (hex)
        #[arg(long, value_parser = parse_hex_u32)]
        id: u32,

        /// Number of battery cells expected
        #[arg(long)]
        cells: u8,

        /// Max charge current (positive amps)
        #[arg(long, allow_negative_numbers = true)]
        charge_max: f64,

        /// Max discharge current (negative amps)
        #[arg(long, allow_negative_numbers = true)]
        discharge_max: f64,

        /// Sequential count mismatches before a cell reset (0 to disable)
        #[arg(long, default_value_t = 0)]
        cell_reset: u16,

        /// Output EEPROM filename
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show metadata and frame counter state
    Show {
        input: PathBuf,

        #[command(flatten)]
        read: ReadOptions,

        /// Print the decoded image as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change individual metadata fields in place
    Set {
        input: PathBuf,

        #[command(flatten)]
        read: ReadOptions,

        #[arg(long, value_parser = parse_hex_u32)]
        id: Option<u32>,

        #[arg(long)]
        cells: Option<u8>,

        #[arg(long, allow_negative_numbers = true)]
        charge_max: Option<f64>,

        #[arg(long, allow_negative_numbers = true)]
        discharge_max: Option<f64>,

        #[arg(long)]
        cell_reset: Option<u16>,
    },
    /// Write a new frame counter value
    SetCounter {
        input: PathBuf,

        value: u32,

        /// Advance to the next ring slot instead of overwriting the current one
        #[arg(long)]
        rotate: bool,

        #[command(flatten)]
        hex: StrictOption,
    },
    /// Hex dump of the whole image
    Dump {
        input: PathBuf,

        #[command(flatten)]
        hex: StrictOption,
    },
}

fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() || digits.len() > 8 {
        return Err(format!("'{}' is not a 1-8 digit hex value", s));
    }
    u32::from_str_radix(digits, 16).map_err(|e| e.to_string())
}

fn main() -> anyhow::Result<()> {
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let format_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(format_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            id,
            cells,
            charge_max,
            discharge_max,
            cell_reset,
            output,
        } => {
            let record = MetadataRecord {
                unique_id: id,
                expected_cell_count: cells,
                max_charge_current: charge_max,
                max_discharge_current: discharge_max,
                sequential_count_mismatch: cell_reset,
            };
            check(&validation::validate_metadata(&record, FormatRevision::Framework))?;

            let mut image = EepromImage::new();
            encode_metadata(&mut image, FormatRevision::Framework, &record)?;
            save_eep(&output, &image)?;

            println!("Generated {}", output.display());
        }
        Commands::Show { input, read, json } => {
            let image = load(&input, &read.decode_options())?;
            let report = ImageReport::from_image(&image, read.revision());

            if json {
                println!("{}", report.to_json()?);
            } else {
                print_report(&report);
            }
        }
        Commands::Set {
            input,
            read,
            id,
            cells,
            charge_max,
            discharge_max,
            cell_reset,
        } => {
            let edits: Vec<FieldEdit> = [
                id.map(FieldEdit::UniqueId),
                cells.map(FieldEdit::ExpectedCellCount),
                charge_max.map(FieldEdit::MaxChargeCurrent),
                discharge_max.map(FieldEdit::MaxDischargeCurrent),
                cell_reset.map(FieldEdit::SequentialCountMismatch),
            ]
            .into_iter()
            .flatten()
            .collect();

            if edits.is_empty() {
                anyhow::bail!("Nothing to change; pass at least one field option");
            }

            let mut image = load(&input, &read.decode_options())?;
            for edit in edits {
                apply_edit(&mut image, read.revision(), edit)
                    .with_context(|| format!("Cannot apply {:?}", edit))?;
            }

            // Existing images may already break the rules, so nothing here is fatal
            let meta = decode_metadata(&image, read.revision());
            let messages = validation::validate_metadata(&meta, read.revision());
            for text in validation::errors(&messages).chain(validation::warnings(&messages)) {
                tracing::warn!("{}", text);
            }

            save_eep(&input, &image)?;
            println!("Updated {}", input.display());
        }
        Commands::SetCounter {
            input,
            value,
            rotate,
            hex,
        } => {
            let mut image = load(&input, &hex.decode_options())?;

            let slot = if rotate {
                frame_counter::rotate_counter(&mut image, value)
            } else {
                frame_counter::set_counter(&mut image, value)
            };

            save_eep(&input, &image)?;
            println!("Frame counter {} written to slot {}", value, slot);
        }
        Commands::Dump { input, hex } => {
            let image = load(&input, &hex.decode_options())?;
            print!("{}", image.printable(None, None));
        }
    }

    Ok(())
}

fn load(path: &Path, options: &DecodeOptions) -> anyhow::Result<EepromImage> {
    load_eep_with(path, options).with_context(|| format!("Failed to load {}", path.display()))
}

/// Print warnings and fail on errors
fn check(messages: &[ValidationMessage]) -> anyhow::Result<()> {
    for text in validation::warnings(messages) {
        tracing::warn!("{}", text);
    }

    let errors: Vec<&str> = validation::errors(messages).collect();
    if !errors.is_empty() {
        anyhow::bail!("{}", errors.join("; "));
    }
    Ok(())
}

fn print_report(report: &ImageReport) {
    let meta = &report.metadata;

    println!("=== Metadata ({}) ===", report.revision);
    println!("  Unique ID:          {:08X}", meta.unique_id);
    println!("  Expected cells:     {}", meta.expected_cell_count);
    println!("  Max charge:         {:.2} A", meta.max_charge_current);
    println!("  Max discharge:      {:.2} A", meta.max_discharge_current);
    println!("  Count mismatch:     {}", meta.sequential_count_mismatch);
    println!();

    println!("=== Frame Counter ===");
    match report.current_counter {
        Some(slot) => {
            println!("  Current value:      {}", slot.value);
            println!("  Current position:   {}", slot.index);
        }
        None => {
            println!("  Current value:      None found");
            println!("  Current position:   N/A");
        }
    }

    for slot in &report.slots {
        let marker = if slot.status == SlotStatus::Current {
            "  <- current"
        } else {
            ""
        };
        println!(
            "  [{:3}] 0x{:04X}  {:10}  {:08X}{}",
            slot.index, slot.address, slot.value, slot.value, marker
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(std::iter::once("eeprom-tool").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_generate_accepts_negative_charge() {
        let command = parse(&[
            "generate",
            "--id",
            "A5",
            "--cells",
            "94",
            "--charge-max",
            "-5",
            "--discharge-max",
            "-300",
            "-o",
            "out.eep",
        ]);
        match command {
            Commands::Generate {
                id,
                charge_max,
                discharge_max,
                ..
            } => {
                assert_eq!(id, 0xA5);
                assert_eq!(charge_max, -5.0);
                assert_eq!(discharge_max, -300.0);
            }
            _ => panic!("expected generate"),
        }

        // Parsed, so the sign rule gets to report it
        let record = MetadataRecord {
            unique_id: 0xA5,
            expected_cell_count: 94,
            max_charge_current: -5.0,
            max_discharge_current: -300.0,
            sequential_count_mismatch: 1,
        };
        let err = check(&validation::validate_metadata(&record, FormatRevision::Framework))
            .unwrap_err();
        assert!(err.to_string().contains("must be a positive number"), "{}", err);
    }

    #[test]
    fn test_strict_flag_is_shared() {
        match parse(&["show", "in.eep", "--legacy", "--strict"]) {
            Commands::Show { read, .. } => {
                assert_eq!(read.revision(), FormatRevision::Legacy);
                assert_eq!(read.decode_options(), DecodeOptions::strict());
            }
            _ => panic!("expected show"),
        }
        match parse(&["set-counter", "in.eep", "7", "--strict"]) {
            Commands::SetCounter { value, hex, .. } => {
                assert_eq!(value, 7);
                assert_eq!(hex.decode_options(), DecodeOptions::strict());
            }
            _ => panic!("expected set-counter"),
        }
        match parse(&["dump", "in.eep"]) {
            Commands::Dump { hex, .. } => {
                assert_eq!(hex.decode_options(), DecodeOptions::default());
            }
            _ => panic!("expected dump"),
        }
    }

    #[test]
    fn test_set_accepts_negative_currents() {
        match parse(&["set", "in.eep", "--charge-max", "-1", "--discharge-max", "-2.5"]) {
            Commands::Set {
                charge_max,
                discharge_max,
                ..
            } => {
                assert_eq!(charge_max, Some(-1.0));
                assert_eq!(discharge_max, Some(-2.5));
            }
            _ => panic!("expected set"),
        }
    }

    #[test]
    fn test_check_passes_warnings_through() {
        let record = MetadataRecord {
            unique_id: 1,
            expected_cell_count: 0,
            max_charge_current: 10.0,
            max_discharge_current: -10.0,
            sequential_count_mismatch: 0,
        };
        let messages = validation::validate_metadata(&record, FormatRevision::Framework);
        assert_eq!(validation::warnings(&messages).count(), 2);
        assert!(check(&messages).is_ok());
    }
}
