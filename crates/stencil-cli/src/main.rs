use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::Path;

use stencil_render::{Context, Engine, FileLoader};

#[derive(Parser)]
#[command(name = "stencil")]
#[command(about = "stencil — text template engine")]
#[command(version)]
struct Cli {
    /// Template root directory
    #[arg(long, default_value = ".")]
    root: String,

    /// Default template extension for bare names
    #[arg(long, default_value = "stencil")]
    ext: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template to stdout
    Render {
        /// Template name, resolved under the root directory
        template: String,

        /// JSON file with the render context
        #[arg(long)]
        data: Option<String>,
    },

    /// Check a template for errors without rendering
    Check {
        /// Template name, resolved under the root directory
        template: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let engine = Engine::new(FileLoader::new(&cli.root, &cli.ext));

    match cli.command {
        Command::Render { template, data } => cmd_render(&engine, &template, data.as_deref()),
        Command::Check { template } => cmd_check(&engine, &template),
    }
}

fn read_context(path: Option<&str>) -> Context {
    let Some(path) = path else {
        return Context::new();
    };
    if !Path::new(path).exists() {
        eprintln!("Error: file not found: {path}");
        std::process::exit(1);
    }
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    };
    match serde_json::from_str(&source) {
        Ok(json) => Context::from_json(json),
        Err(e) => {
            eprintln!("Error parsing {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_render(engine: &Engine, template: &str, data: Option<&str>) {
    let mut ctx = read_context(data);

    let output = match engine.render_file(template, &mut ctx) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Render error: {e}");
            std::process::exit(1);
        }
    };

    let mut stdout = std::io::stdout();
    if let Err(e) = stdout.write_all(output.as_bytes()) {
        eprintln!("Error writing output: {e}");
        std::process::exit(1);
    }
}

fn cmd_check(engine: &Engine, template: &str) {
    if let Err(e) = engine.check_file(template) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    eprintln!("OK: {template}");
}
