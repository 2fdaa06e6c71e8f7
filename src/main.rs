//! effectgraph CLI - Raster Filter Effect Graphs
//!
//! Inspects, validates and renders JSON graph descriptions.

use anyhow::{anyhow, bail, Context, Result};
use effectgraph::prelude::*;
use std::path::Path;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        return;
    }

    let outcome = match args[1].as_str() {
        "list" => {
            list_effects();
            Ok(())
        }
        "dump" => match args.get(2) {
            Some(path) => dump_graph(Path::new(path)),
            None => Err(anyhow!("Please specify a graph file")),
        },
        "validate" => match args.get(2) {
            Some(path) => validate_graph(Path::new(path)),
            None => Err(anyhow!("Please specify a graph file")),
        },
        "render" => {
            if args.len() < 5 {
                eprintln!("Usage: {} render <graph.json> <input.png> <output.png>", args[0]);
                std::process::exit(2);
            }
            render(Path::new(&args[2]), Path::new(&args[3]), Path::new(&args[4]))
        }
        "help" | "--help" | "-h" => {
            print_usage(&args[0]);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage(&args[0]);
            std::process::exit(2);
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("effectgraph v{}", effectgraph::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list                             List all effect kinds");
    println!("  dump <graph.json>                Print the effect tree of a graph");
    println!("  validate <graph.json>            Check a graph without rendering it");
    println!("  render <graph.json> <in> <out>   Apply a graph to a PNG image");
    println!("  help                             Show this help message");
    println!();
    println!("Set RUST_LOG=debug to trace evaluation, EFFECTGRAPH_THREADS to size the worker pool.");
}

fn list_effects() {
    println!("Effect kinds ({} total):", EffectKind::ALL_NAMES.len());
    for name in EffectKind::ALL_NAMES {
        println!("  • {}", name);
    }
}

fn load(path: &Path) -> Result<SerializedGraph> {
    SerializedGraph::load(path).with_context(|| format!("failed to load graph {}", path.display()))
}

fn dump_graph(path: &Path) -> Result<()> {
    let graph = load(path)?.build().context("failed to build graph")?;
    let root = graph.last_effect().ok_or(GraphError::NoRootEffect)?;
    print!("{}", graph.external_representation(root)?);
    Ok(())
}

fn validate_graph(path: &Path) -> Result<()> {
    let graph = load(path)?.build().context("failed to build graph")?;
    let report = ValidationPipeline::default().validate(&graph);

    for warning in &report.warnings {
        println!("⚠️  {}", warning.message);
        if let Some(suggestion) = &warning.suggestion {
            println!("   -> {}", suggestion);
        }
    }
    for error in report.detailed_errors() {
        println!("❌ {}", error);
    }
    println!("{} ({}ms)", report.summary(), report.duration_ms);

    if !report.can_evaluate() {
        bail!("graph is not valid");
    }
    Ok(())
}

fn render(graph_path: &Path, input: &Path, output: &Path) -> Result<()> {
    let mut description = load(graph_path)?;
    let decoded = image::open(input)
        .with_context(|| format!("failed to read {}", input.display()))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();

    if description.filter_region.is_none() {
        let [scale_x, scale_y] = description.scale;
        description.filter_region = Some(FloatRect::new(
            0.0,
            0.0,
            width as f32 / scale_x,
            height as f32 / scale_y,
        ));
    }
    let mut graph = description.build().context("failed to build graph")?;
    graph.set_source_image(SourceImage::new(
        PixelBuffer::from_rgba_image(decoded),
        IntPoint::default(),
    ));

    println!("⚙️  Rendering {} -> {}", input.display(), output.display());
    let result = EvaluationEngine::new().evaluate(&mut graph)?;
    for error in result.origin_errors() {
        eprintln!("❌ {}", error);
    }
    let image = result
        .image
        .ok_or_else(|| anyhow!("the output effect produced no image"))?;

    // Place the result on a canvas the size of the input.
    let canvas = IntRect::new(0, 0, width as i32, height as i32);
    let placed = image.copy_region(result.paint_rect.location(), &canvas);
    let encoded = placed
        .into_rgba_image()
        .ok_or_else(|| anyhow!("result buffer has the wrong size"))?;
    encoded
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "✅ Complete in {:?} ({} nodes evaluated, {} pixels)",
        result.stats.total_duration, result.stats.nodes_evaluated, result.stats.pixels_produced
    );
    Ok(())
}
