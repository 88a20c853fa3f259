//! mdl-tools: converts skinned models between glTF scenes and the grouped mesh format.
//!
//! ```bash
//! mdl-tools import body.gltf -o body.json
//! mdl-tools export body.json --skeleton body.skel -o body_out.gltf
//! mdl-tools skeleton body.skel
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use mdl_tools_lib::{
    convert::{export_model, import_scene, ConvertOptions},
    diagnostics::ConversionReport,
    model::Model,
    scene::{gltf_reader::load_source_scene, gltf_writer::GltfSceneBuilder},
    skeleton::BoneTree,
};

#[derive(Parser)]
#[command(name = "mdl-tools", version, about = "Skinned model conversion tools")]
struct Cli {
    #[command(flatten)]
    options: OptionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert a glTF scene into a model file
    Import {
        /// Input .gltf or .glb
        input: PathBuf,

        /// Output model file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Convert a model file plus skeleton into a glTF scene
    Export {
        /// Input model file
        input: PathBuf,

        /// Line-delimited skeleton file
        #[arg(short, long)]
        skeleton: PathBuf,

        /// Output .gltf
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the bone hierarchy of a skeleton file
    Skeleton {
        path: PathBuf,
    },
}

/// Flags shared by every command
#[derive(Args)]
struct OptionArgs {
    /// JSON file with conversion options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Prefix for exported part names
    #[arg(long, global = true)]
    model_name: Option<String>,

    /// Keep meshes that have no skin
    #[arg(long, global = true)]
    allow_unskinned: bool,

    /// Reject meshes with more than 4 influences on a control point
    #[arg(long, global = true)]
    reject_weight_overflow: bool,
}

impl OptionArgs {
    fn resolve(&self) -> Result<ConvertOptions> {
        let mut options = match &self.config {
            Some(path) => ConvertOptions::from_file(path)?,
            None => ConvertOptions::default(),
        };
        if let Some(name) = &self.model_name {
            options.model_name = name.clone();
        }
        options.allow_unskinned |= self.allow_unskinned;
        options.reject_weight_overflow |= self.reject_weight_overflow;
        Ok(options)
    }
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let options = cli.options.resolve()?;
    let mut report = ConversionReport::new();

    match cli.command {
        Command::Import { input, output } => {
            let scene = load_source_scene(&input, &options.shape_prefix, &mut report)?;
            let model = import_scene(&scene, &options, &mut report)?;
            model.write_to(&output)?;
        }
        Command::Export {
            input,
            skeleton,
            output,
        } => {
            let model = Model::from_file(&input)?;
            let skeleton = BoneTree::from_file(&skeleton, &options.root_bone_name, &mut report)?;
            let mut builder = GltfSceneBuilder::new();
            export_model(&model, &skeleton, &options, &mut builder, &mut report)?;
            builder.write_to(&output)?;
        }
        Command::Skeleton { path } => {
            let skeleton = BoneTree::from_file(&path, &options.root_bone_name, &mut report)?;
            ptree::print_tree(&skeleton.to_ptree())?;
        }
    }

    log::info!(
        "Done: {} errors, {} warnings, {} notes",
        report.error_count,
        report.warning_count,
        report.info_count
    );
    Ok(())
}
