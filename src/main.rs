use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use firm_matcher::{
    load_directory_csv, load_overrides, load_roster_csv, write_run_json, BucketStrategy,
    CandidateIndex, Directory, FirmMatcher, MatchConfig, MatchMethod, ScorerBackend,
};

#[derive(Parser)]
#[command(author, version, about = "Match Broker Protocol roster firms to directory CRD IDs", long_about = None)]
struct Args {
    /// Directory CSV (NAME, CRD_ID)
    directory: PathBuf,

    /// Roster CSV (firm_name, former_names, dbas, previous match columns)
    roster: Option<PathBuf>,

    /// Write the run (results + summary) as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Minimum fuzzy score (default 0.60)
    #[arg(short = 't', long)]
    threshold: Option<f64>,

    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Manual overrides (JSON array or CSV)
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Best of ratio / token-set / token-sort / partial
    #[arg(long)]
    token_fuzzy: bool,

    /// Also search former names and DBAs
    #[arg(long)]
    variants: bool,

    /// Re-match records even when their previous match is known-good
    #[arg(long)]
    no_protect: bool,

    /// Strip footnote markers and notes from roster names
    #[arg(long)]
    cleanup: bool,

    /// first_char, first_two, first_token or hybrid
    #[arg(long)]
    bucket: Option<BucketStrategy>,

    /// Flag fuzzy matches whose lead over the runner-up is below this
    #[arg(long)]
    ambiguity_margin: Option<f64>,

    /// levenshtein or indel
    #[arg(long)]
    scorer: Option<ScorerBackend>,

    /// Match a single firm name and print the result
    #[arg(long)]
    firm: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// File config (or defaults) with command-line flags applied on top
    fn match_config(&self) -> Result<MatchConfig> {
        let mut config = match &self.config {
            Some(path) => MatchConfig::from_file(path)?,
            None => MatchConfig::default(),
        };

        if let Some(threshold) = self.threshold {
            config.confidence_threshold = threshold;
        }
        if self.token_fuzzy {
            config.use_token_fuzzy = true;
        }
        if self.variants {
            config.use_variants = true;
        }
        if self.no_protect {
            config.protect_known_good = false;
        }
        if self.cleanup {
            config.cleanup_names = true;
        }
        if let Some(bucket) = self.bucket {
            config.bucket_strategy = bucket;
        }
        if let Some(margin) = self.ambiguity_margin {
            config.ambiguity_margin = Some(margin);
        }
        if let Some(scorer) = self.scorer {
            config.scorer = scorer;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let config = args.match_config()?;
    let cleanup_mode = config.cleanup_names;

    let mut matcher = FirmMatcher::new(config)?;
    if let Some(path) = &args.overrides {
        matcher = matcher.with_overrides(load_overrides(path, cleanup_mode)?);
    }

    let directory = load_directory_csv(&args.directory)?;

    if let Some(name) = &args.firm {
        return run_single(&matcher, &directory, name);
    }

    let Some(roster_path) = &args.roster else {
        bail!("A roster CSV is required unless --firm is given");
    };

    run_batch(&matcher, &directory, roster_path, args.output.as_deref())
}

fn run_single(matcher: &FirmMatcher, directory: &Directory, name: &str) -> Result<()> {
    let index = CandidateIndex::build(directory);
    let result = matcher.match_name(name, &index);

    println!("🔍 {}", name);
    match result.method {
        MatchMethod::Unmatched => println!("   ✗ No match (needs review)"),
        method => println!(
            "   ✓ {} (CRD {}) via {} at {:.3}{}",
            result.matched_name.as_deref().unwrap_or("?"),
            result.crd_id.map(|id| id.to_string()).unwrap_or_default(),
            method,
            result.confidence.unwrap_or(0.0),
            if result.needs_review { " - needs review" } else { "" }
        ),
    }

    Ok(())
}

fn run_batch(
    matcher: &FirmMatcher,
    directory: &Directory,
    roster_path: &Path,
    output: Option<&Path>,
) -> Result<()> {
    println!("🏦 Firm Matcher v{}", firm_matcher::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let records = load_roster_csv(roster_path)?;
    println!("✓ Loaded {} directory firms, {} roster firms", directory.len(), records.len());

    let run = matcher.match_all(&records, directory);

    println!("\n📊 {}", run.summary.summary());
    for (method, count) in &run.summary.by_method {
        println!("   {:<18} {}", method.as_str(), count);
    }
    if !run.summary.by_variant.is_empty() {
        println!("\n   Matched on:");
        for (variant, count) in &run.summary.by_variant {
            println!("   {:<18} {}", variant.as_str(), count);
        }
    }

    for alert in &run.alerts {
        println!("⚠️  {}", alert);
    }

    if let Some(path) = output {
        write_run_json(path, &run).with_context(|| format!("Failed to save run {}", run.run_id))?;
        println!("\n💾 Results written to {:?}", path);
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Run {} finished in {} ms", run.run_id, run.duration_ms());

    Ok(())
}
