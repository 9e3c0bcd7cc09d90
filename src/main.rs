// ABOUTME: Main entry point for the carousel program.
// ABOUTME: Provides CLI interface and executes commands from the library.

use anyhow::Context;
use carousel::{
    render_all_slides, utils, Config, ContentPayload, GenerationRequest, SlideTemplate, Studio,
};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render content JSON against a template JSON into HTML slides
    Render(RenderArgs),

    /// Generate a carousel through the backend and store it in the gallery
    Generate(GenerateArgs),

    /// Inspect and manage the local gallery
    #[command(subcommand)]
    Gallery(GalleryCommand),
}

#[derive(Args)]
struct RenderArgs {
    /// Path to the template file (slide array or definition)
    #[arg(short, long)]
    template: PathBuf,

    /// Path to the content payload file
    #[arg(short, long)]
    content: PathBuf,

    /// Directory to write the slides to
    #[arg(short, long)]
    output: PathBuf,

    /// Base name for slide files
    #[arg(long, default_value = "slide")]
    base_name: String,
}

#[derive(Args)]
struct GenerateArgs {
    /// Post code, link or other content reference
    #[arg(short = 'r', long)]
    content_ref: String,

    /// Template to generate with (defaults to DEFAULT_TEMPLATE_ID)
    #[arg(short, long)]
    template_id: Option<String>,

    /// Id of the source post
    #[arg(long)]
    source_id: Option<u64>,

    /// JSON file describing the source item (news article, link, chat output)
    #[arg(long)]
    payload: Option<PathBuf>,
}

#[derive(Subcommand)]
enum GalleryCommand {
    /// List local gallery entries
    List,

    /// Merge the remote listing into the local gallery
    Sync,

    /// Delete an entry remotely and locally
    Delete {
        /// Gallery entry id
        id: String,
    },

    /// Remove every local entry
    Clear,
}

fn render_command(args: &RenderArgs) -> anyhow::Result<()> {
    utils::validate_file_exists(&args.template)?;
    utils::validate_file_exists(&args.content)?;

    let template_body = fs::read_to_string(&args.template)
        .with_context(|| format!("Failed to read template {:?}", args.template))?;
    let templates: Vec<SlideTemplate> = carousel::resources::parse_template_document(&template_body)?;

    let content_body = fs::read_to_string(&args.content)
        .with_context(|| format!("Failed to read content {:?}", args.content))?;
    let content: ContentPayload = serde_json::from_str(&content_body)?;

    let slides = render_all_slides(&templates, &content)?;

    utils::ensure_directory_exists(&args.output)?;
    for (i, slide) in slides.iter().enumerate() {
        let path = args.output.join(format!("{}_{:04}.html", args.base_name, i + 1));
        fs::write(&path, slide).with_context(|| format!("Failed to write {:?}", path))?;
        info!("Wrote {:?}", path);
    }

    println!("Rendered {} slides into {:?}", slides.len(), args.output);
    Ok(())
}

async fn generate_command(config: &Config, args: &GenerateArgs) -> anyhow::Result<()> {
    let studio = Studio::from_config(config)?;

    let template_id = args
        .template_id
        .clone()
        .unwrap_or_else(|| config.default_template_id.clone());
    let mut request = GenerationRequest::new(&args.content_ref, template_id);
    if let Some(source_id) = args.source_id {
        request = request.with_source_id(source_id);
    }
    if let Some(path) = &args.payload {
        let body = fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload {:?}", path))?;
        request = request.with_rich_payload(serde_json::from_str(&body)?);
    }

    let (job_id, handle) = studio.submit(request);
    println!("Queued job {}", job_id);

    let entry = handle.await.context("Generation task failed")??;
    println!(
        "Generated {} slides, stored as gallery entry {}",
        entry.slides.len(),
        entry.id
    );
    Ok(())
}

async fn gallery_command(config: &Config, command: &GalleryCommand) -> anyhow::Result<()> {
    let studio = Studio::from_config(config)?;

    match command {
        GalleryCommand::List => {
            let entries = studio.gallery().get_all();
            for entry in &entries {
                println!(
                    "{}\t{}\t{}\t{} slides{}",
                    entry.id,
                    entry.content_ref,
                    entry.template_name,
                    entry.slides.len(),
                    if entry.viewed { "" } else { "\t(new)" }
                );
            }
            println!(
                "{} entries, {} unviewed",
                entries.len(),
                studio.gallery().unviewed_count()
            );
        }
        GalleryCommand::Sync => {
            let entries = studio.sync_gallery().await;
            println!("Gallery holds {} entries", entries.len());
        }
        GalleryCommand::Delete { id } => {
            studio.delete_entry(id).await?;
            println!("Deleted {}", id);
        }
        GalleryCommand::Clear => {
            studio.clear_gallery()?;
            println!("Gallery cleared");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let config = Config::from_env();

    let result = match &cli.command {
        Some(Commands::Render(args)) => {
            println!("Executing render command...");
            render_command(args)
        }
        Some(Commands::Generate(args)) => {
            println!("Executing generate command...");
            generate_command(&config, args).await
        }
        Some(Commands::Gallery(command)) => gallery_command(&config, command).await,
        None => {
            println!("No command specified. Use --help for usage information.");
            Ok(())
        }
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
