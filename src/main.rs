//! canonize CLI: entity resolution over JSON-lines corpora.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result, bail};

use canonize::index::{DEFAULT_MATCH_LIMIT, Index};
use canonize::judgement::Judgement;
use canonize::model::record::prop_type;
use canonize::model::{Corpus, MemoryCorpus, PropType};
use canonize::resolver::Resolver;
use canonize::xref::xref;

#[derive(Parser)]
#[command(name = "canonize", version, about = "Entity resolution engine")]
struct Cli {
    /// Path to the resolver edge log.
    #[arg(long, global = true, default_value = "resolver.log")]
    resolver: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cross-reference a corpus and record match suggestions.
    Xref {
        /// JSON-lines corpus file.
        corpus: PathBuf,

        /// Index snapshot path (rebuilt and saved when missing).
        #[arg(long)]
        index_cache: Option<PathBuf>,

        /// Matches to consider per entity.
        #[arg(long, default_value_t = DEFAULT_MATCH_LIMIT)]
        limit: usize,

        /// Include tokens from directly adjacent entities.
        #[arg(long)]
        adjacency: bool,
    },

    /// Match one entity against a corpus index.
    Match {
        /// JSON-lines corpus file.
        corpus: PathBuf,

        /// Entity id to match.
        id: String,

        #[arg(long, default_value_t = DEFAULT_MATCH_LIMIT)]
        limit: usize,

        #[arg(long)]
        index_cache: Option<PathBuf>,

        #[arg(long)]
        adjacency: bool,
    },

    /// List reviewable candidate pairs, best score first.
    Candidates {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Record a judgement between two entity ids.
    Decide {
        left: String,
        right: String,
        #[arg(value_enum)]
        judgement: JudgementArg,
    },

    /// Dissolve every decision in the cluster around an id.
    Explode { id: String },

    /// Trim stored suggestions to the best-scoring ones.
    Prune {
        /// Suggestions to keep; 0 clears all of them.
        #[arg(long, default_value_t = 0)]
        keep: usize,
    },

    /// Rewrite a corpus's ids and entity references to canonical ids.
    Apply {
        corpus: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// Print the resolver edge log to stdout.
    Dump,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum JudgementArg {
    Positive,
    Negative,
    Unsure,
}

impl From<JudgementArg> for Judgement {
    fn from(arg: JudgementArg) -> Self {
        match arg {
            JudgementArg::Positive => Judgement::Positive,
            JudgementArg::Negative => Judgement::Negative,
            JudgementArg::Unsure => Judgement::Unsure,
        }
    }
}

fn load_resolver(path: &Path) -> Result<Resolver> {
    if path.exists() {
        Ok(Resolver::load(path)?)
    } else {
        Ok(Resolver::new())
    }
}

fn load_index(
    cache: Option<&Path>,
    corpus: &MemoryCorpus,
    adjacency: bool,
    cancel: &AtomicBool,
) -> Result<Index> {
    match cache {
        Some(path) => Ok(Index::load_or_build(path, corpus, adjacency, cancel)?),
        None => {
            let mut index = Index::new(adjacency);
            index.build(corpus, cancel);
            index.commit();
            Ok(index)
        }
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cancel = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, cancel.clone()).into_diagnostic()?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Xref {
            corpus,
            index_cache,
            limit,
            adjacency,
        } => {
            let corpus = MemoryCorpus::load(&corpus)?;
            let index = load_index(index_cache.as_deref(), &corpus, adjacency, &cancel)?;
            let mut resolver = load_resolver(&cli.resolver)?;
            let stats = xref(&index, &mut resolver, &corpus, limit, &cancel)?;
            resolver.save(&cli.resolver)?;
            println!(
                "{} entities, {} suggestions (avg {:.2}, min {:.2}, max {:.2})",
                stats.entities,
                stats.matches,
                stats.avg_score(),
                stats.min_score,
                stats.max_score,
            );
        }

        Commands::Match {
            corpus,
            id,
            limit,
            index_cache,
            adjacency,
        } => {
            let corpus = MemoryCorpus::load(&corpus)?;
            let index = load_index(index_cache.as_deref(), &corpus, adjacency, &cancel)?;
            let Some(query) = corpus.get(&id) else {
                bail!("entity not found in corpus: {id}");
            };
            for (candidate, score) in index.match_entity(&corpus, query, limit) {
                println!("{score:.4}\t{candidate}");
            }
        }

        Commands::Candidates { limit } => {
            let resolver = load_resolver(&cli.resolver)?;
            for (target, source, score) in resolver.get_candidates(limit) {
                println!("{:.4}\t{target}\t{source}", score.unwrap_or(0.0));
            }
        }

        Commands::Decide {
            left,
            right,
            judgement,
        } => {
            let mut resolver = load_resolver(&cli.resolver)?;
            let target = resolver.decide(left.as_str(), right.as_str(), judgement.into(), None, None)?;
            resolver.save(&cli.resolver)?;
            println!("{target}");
        }

        Commands::Explode { id } => {
            let mut resolver = load_resolver(&cli.resolver)?;
            let affected = resolver.explode(&id);
            resolver.save(&cli.resolver)?;
            for member in affected {
                println!("{member}");
            }
        }

        Commands::Prune { keep } => {
            let mut resolver = load_resolver(&cli.resolver)?;
            resolver.prune(keep);
            resolver.save(&cli.resolver)?;
        }

        Commands::Apply { corpus, output } => {
            let resolver = load_resolver(&cli.resolver)?;
            let corpus = MemoryCorpus::load(&corpus)?;
            let file = File::create(&output).into_diagnostic()?;
            let mut writer = BufWriter::new(file);
            for record in corpus.entities() {
                let mut rewritten = record.clone();
                let canonical = resolver.get_canonical(&record.id);
                if canonical != record.id {
                    rewritten.id = canonical;
                    rewritten
                        .properties
                        .entry("sameAs".to_string())
                        .or_default()
                        .push(record.id.clone());
                }
                for (prop, values) in rewritten.properties.iter_mut() {
                    if prop_type(prop) != PropType::Entity {
                        continue;
                    }
                    for value in values.iter_mut() {
                        *value = resolver.get_canonical(value);
                    }
                }
                let line = serde_json::to_string(&rewritten).into_diagnostic()?;
                writeln!(writer, "{line}").into_diagnostic()?;
            }
            writer.flush().into_diagnostic()?;
        }

        Commands::Dump => {
            let resolver = load_resolver(&cli.resolver)?;
            for edge in resolver.edges() {
                println!("{}", edge.to_line());
            }
        }
    }
    Ok(())
}
