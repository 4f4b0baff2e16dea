//! rawr - a resource bundle build and resolution engine.

mod build;
mod bundle;
mod config;
mod core;
mod error;
mod generator;
mod logger;
mod processor;
mod reader;
mod resolve;
mod store;
mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use bundle::variant::VariantPoint;
use config::Config;
use generator::GeneratorRegistry;
use reader::{FsResourceReader, ReaderHandler};
use resolve::{RenderPass, ResolvedItem};
use store::FsBundleStore;

#[derive(Parser)]
#[command(name = "rawr", version, about = "Resource bundle build and resolution engine")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "rawr.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble and store every bundle
    Build,
    /// Print the include paths a page would get for a bundle id
    Resolve {
        /// The bundle id to resolve (e.g. /js/app.js)
        bundle_id: String,

        /// Force debug-mode resolution regardless of configuration
        #[arg(long)]
        debug: bool,

        /// Variant selection as axis=key, repeatable
        #[arg(long = "variant", value_name = "AXIS=KEY")]
        variants: Vec<String>,
    },
    /// Validate the configuration and exit
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::set_verbose(cli.verbose);

    match &cli.command {
        Commands::Build => cmd_build(&cli.config),
        Commands::Resolve {
            bundle_id,
            debug,
            variants,
        } => cmd_resolve(&cli.config, bundle_id, *debug, variants),
        Commands::Check => cmd_check(&cli.config),
    }
}

/// Wire the reader and store from the engine configuration.
fn open_engine(config: &Config) -> (ReaderHandler, FsBundleStore) {
    let handler = ReaderHandler::new(
        FsResourceReader::new(&config.engine.resource_root),
        Arc::new(GeneratorRegistry::with_defaults()),
        config.engine.charset.clone(),
    );
    let store = FsBundleStore::new(&config.engine.store_root);
    (handler, store)
}

fn cmd_build(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let (handler, store) = open_engine(&config);
    build::run_build(&config, &handler, &store)?;
    Ok(())
}

fn cmd_resolve(
    config_path: &Path,
    bundle_id: &str,
    force_debug: bool,
    variants: &[String],
) -> Result<()> {
    let mut config = Config::load(config_path)?;
    if force_debug {
        config.engine.debug = true;
    }
    let requested = parse_variants(variants)?;

    let (handler, store) = open_engine(&config);
    // Production serves what `rawr build` persisted; debug needs no
    // artifacts at all. Neither assembles here.
    let report = build::load_registry(&config, &handler, &store)?;

    let mut pass = RenderPass::new();
    let items = resolve::resolve(&report.registry, bundle_id, &requested, &mut pass)?;
    let prefix = if config.engine.debug {
        ""
    } else {
        config.engine.url_prefix.as_str()
    };
    for item in items {
        match item {
            ResolvedItem::BundleStart(id) => println!("/* {id} */"),
            ResolvedItem::Path(path) => println!("{prefix}{path}"),
        }
    }
    Ok(())
}

fn cmd_check(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            log!("error"; "{problem}");
        }
        bail!("{} configuration problem(s) found", problems.len());
    }

    // Full construction also catches cycles and illegal dependencies
    let (handler, _store) = open_engine(&config);
    let (bundles, warnings) = build::construct_bundles(&config, &handler)?;
    log!(
        "check";
        "configuration OK ({} bundles, {} warnings)",
        bundles.len(),
        warnings.len()
    );
    Ok(())
}

/// Parse repeated `axis=key` arguments into a variant point.
fn parse_variants(pairs: &[String]) -> Result<VariantPoint> {
    let mut point = VariantPoint::new();
    for pair in pairs {
        let Some((axis, key)) = pair.split_once('=') else {
            bail!("invalid variant selector '{pair}', expected AXIS=KEY");
        };
        point.insert(axis.trim().to_string(), key.trim().to_string());
    }
    Ok(point)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants() {
        let point =
            parse_variants(&["locale=fr".to_string(), "skin=winter".to_string()]).unwrap();
        assert_eq!(point["locale"], "fr");
        assert_eq!(point["skin"], "winter");
    }

    #[test]
    fn test_parse_variants_rejects_bare_token() {
        assert!(parse_variants(&["locale".to_string()]).is_err());
    }
}
