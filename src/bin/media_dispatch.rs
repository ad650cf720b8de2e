//! media-dispatch CLI：列出已配置的提供商，或执行一次生成请求
//!
//! Usage:
//!   media-dispatch providers                      List configured providers
//!   media-dispatch generate [OPTIONS]             Run one generation request

use anyhow::{anyhow, bail, Context};
use media_dispatch::types::ImagePayload;
use media_dispatch::{Dispatcher, GenerationRequest, ProviderRegistry, Settings};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "providers" | "list" => cmd_providers(),
        "generate" => cmd_generate(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("media-dispatch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"media-dispatch：生成式媒体分发命令行工具

USAGE:
    media-dispatch <COMMAND> [OPTIONS]

COMMANDS:
    providers                   List configured providers and their capabilities
    generate [OPTIONS]          Run one generation request, print the response as JSON
    version                     Show version information
    help                        Show this help message

GENERATE OPTIONS:
    --request <file>            Start from a JSON request file
    --provider <id>             google | falai | replicate | minimax | openrouter | runpod | devstral
    --type <type>               image | video | text
    --prompt <text>
    --style <text>
    --aspect <ratio>            1:1 | 16:9 | 9:16
    --seed <n>
    --image <file>              Source image (repeat for multi-image providers)
    --out <file>                Write inline media to a file instead of printing it

ENVIRONMENT:
    MEDIA_DISPATCH_CONFIG       YAML provider settings (otherwise read from env)
    RUST_LOG                    Log filter, e.g. media_dispatch=debug"#
    );
}

fn load_registry() -> anyhow::Result<ProviderRegistry> {
    let settings = Settings::load().context("loading provider settings")?;
    Ok(ProviderRegistry::initialize(&settings))
}

fn cmd_providers() -> anyhow::Result<()> {
    let registry = load_registry()?;
    if registry.is_empty() {
        eprintln!("No providers configured. Set e.g. FAL_KEY or MEDIA_DISPATCH_CONFIG.");
    }
    println!("{}", serde_json::to_string_pretty(&registry.all_capabilities())?);
    Ok(())
}

struct GenerateArgs {
    request: Map<String, Value>,
    images: Vec<PathBuf>,
    out: Option<PathBuf>,
}

fn parse_generate_args(args: &[String]) -> anyhow::Result<GenerateArgs> {
    let mut parsed = GenerateArgs {
        request: Map::new(),
        images: Vec::new(),
        out: None,
    };
    let mut overrides = Map::new();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{flag} needs a value"))
        };
        match flag.as_str() {
            "--request" => {
                let path = value()?;
                let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
                match serde_json::from_str(&text).with_context(|| format!("parsing {path}"))? {
                    Value::Object(map) => parsed.request = map,
                    _ => bail!("{path} must contain a JSON object"),
                }
            }
            "--provider" => {
                overrides.insert("provider".into(), Value::String(value()?));
            }
            "--type" => {
                overrides.insert("type".into(), Value::String(value()?));
            }
            "--prompt" => {
                overrides.insert("prompt".into(), Value::String(value()?));
            }
            "--style" => {
                overrides.insert("style".into(), Value::String(value()?));
            }
            "--aspect" => {
                overrides.insert("aspectRatio".into(), Value::String(value()?));
            }
            "--seed" => {
                let raw = value()?;
                let seed: u64 = raw.parse().with_context(|| format!("invalid seed: {raw}"))?;
                overrides.insert("seed".into(), Value::from(seed));
            }
            "--image" => parsed.images.push(PathBuf::from(value()?)),
            "--out" => parsed.out = Some(PathBuf::from(value()?)),
            other => bail!("unknown option: {other}"),
        }
    }
    parsed.request.extend(overrides);
    Ok(parsed)
}

async fn cmd_generate(args: &[String]) -> anyhow::Result<()> {
    let parsed = parse_generate_args(args)?;
    let mut request: GenerationRequest =
        serde_json::from_value(Value::Object(parsed.request)).context("decoding request")?;

    let mut images = Vec::new();
    for path in &parsed.images {
        let img = ImagePayload::from_file(path).with_context(|| format!("reading {}", path.display()))?;
        images.push(img);
    }
    match images.len() {
        0 => {}
        1 => {
            request.source_mime_type = Some(images[0].mime_type.clone());
            request.source_image = Some(images.remove(0).data);
        }
        _ => request.source_images = images.into_iter().map(|i| i.to_data_uri()).collect(),
    }

    let dispatcher = Dispatcher::new(Arc::new(load_registry()?));
    let mut response = dispatcher.dispatch(&request).await;

    if let (Some(out), media_dispatch::GenerationResponse::Success(data)) = (&parsed.out, &mut response) {
        if let Some(b64) = data.media_base64.take() {
            use base64::Engine;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(b64.as_bytes())
                .context("decoding media")?;
            std::fs::write(out, bytes).with_context(|| format!("writing {}", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
    }

    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.is_success() {
        std::process::exit(2);
    }
    Ok(())
}
