use crate::core::importer::ImportOptions;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "lithmod")]
#[command(about = "Build, merge and inspect 3D lithology voxel models")]
pub struct CliConfig {
    #[command(subcommand)]
    pub command: Command,

    /// Directory every input and output path is relative to
    #[arg(long, global = true, default_value = ".")]
    pub base_path: String,

    /// Seed for lithology colours (random when omitted)
    #[arg(long, global = true)]
    pub color_seed: Option<u64>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log CPU and memory use per phase")]
    pub monitor: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// `x, y, z, label` rows
    Xyz,
    /// Block model export with one row per cell centre
    BlockModel,
}

#[derive(Debug, Clone, Serialize, Deserialize, Subcommand)]
pub enum Command {
    /// Build a model from scattered points or a block model export
    Import {
        input: String,
        #[arg(short, long, default_value = "model.zip")]
        output: String,
        #[arg(long, value_enum, default_value = "xyz")]
        format: InputFormat,
        /// Block models only: label column to read
        #[arg(long)]
        label_column: Option<String>,
        /// Also write a per-voxel CSV
        #[arg(long)]
        csv: Option<String>,
    },
    /// Merge a slave archive into a master archive
    Merge {
        master: String,
        slave: String,
        #[arg(short, long, default_value = "merged.zip")]
        output: String,
        #[arg(long)]
        csv: Option<String>,
    },
    /// Summarise an archive
    Info { archive: String },
    /// Write one CSV row per assigned voxel
    ExportCsv {
        archive: String,
        #[arg(short, long, default_value = "voxels.csv")]
        output: String,
    },
}

impl CliConfig {
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            color_seed: self.color_seed,
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("base_path", &self.base_path)?;
        match &self.command {
            Command::Import {
                input,
                output,
                format,
                csv,
                ..
            } => {
                validation::validate_path("input", input)?;
                if *format == InputFormat::BlockModel {
                    validation::validate_extension("input", input, &["csv"])?;
                }
                validation::validate_archive_path("output", output)?;
                if let Some(csv) = csv {
                    validation::validate_extension("csv", csv, &["csv"])?;
                }
            }
            Command::Merge {
                master,
                slave,
                output,
                csv,
            } => {
                validation::validate_archive_path("master", master)?;
                validation::validate_archive_path("slave", slave)?;
                validation::validate_archive_path("output", output)?;
                if let Some(csv) = csv {
                    validation::validate_extension("csv", csv, &["csv"])?;
                }
            }
            Command::Info { archive } => validation::validate_archive_path("archive", archive)?,
            Command::ExportCsv { archive, output } => {
                validation::validate_archive_path("archive", archive)?;
                validation::validate_extension("output", output, &["csv"])?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_with_globals() {
        let config = CliConfig::try_parse_from([
            "lithmod",
            "import",
            "survey.csv",
            "--format",
            "block-model",
            "--label-column",
            "rocktype",
            "--color-seed",
            "3",
            "--verbose",
        ])
        .unwrap();

        assert!(config.verbose);
        assert_eq!(config.import_options().color_seed, Some(3));
        match &config.command {
            Command::Import {
                input,
                output,
                format,
                label_column,
                csv,
            } => {
                assert_eq!(input, "survey.csv");
                assert_eq!(output, "model.zip");
                assert_eq!(*format, InputFormat::BlockModel);
                assert_eq!(label_column.as_deref(), Some("rocktype"));
                assert!(csv.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_output_must_be_an_archive() {
        let config =
            CliConfig::try_parse_from(["lithmod", "merge", "a.zip", "b.zip", "-o", "out.txt"]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_block_model_input_must_be_csv() {
        let config = CliConfig::try_parse_from([
            "lithmod",
            "import",
            "survey.txt",
            "--format",
            "block-model",
        ])
        .unwrap();
        assert!(config.validate().is_err());
    }
}
