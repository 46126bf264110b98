//! eventscout is a CLI tool that crawls event websites, extracts events with an
//! LLM into a local database and answers questions about the stored events.
//!
//! The tool has four commands:
//! 1. `crawl` - Crawls seed URLs, extracts events and saves new ones to the database
//! 2. `ask` - Answers a question about the stored events
//! 3. `list` - Prints the stored events ordered by date
//! 4. `clear` - Deletes all stored events

extern crate spider;

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::{LevelFilter, info};
use scraper::Selector as ScraperSelector;
use spider::tokio;

use eventscout::{
    CrawlContext, CrawlSettings, SpiderCrawler, Storage, TextBy, answer_query,
    chat::{ChatContext, model_builder, rate_limiter},
    constants::{ASSISTANT_SYSTEM_PROMPT, EXTRACTION_SYSTEM_PROMPT, EXTRACTION_TEMPERATURE},
    crawl_all,
    pipeline::{crawl_if_empty, read_seeds_file},
    query::render_events,
};

const DEFAULT_MODEL: &str = "openai://gpt-4o-mini";

/// A CLI tool to collect events from websites and ask questions about them
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The command to execute
    #[command(subcommand)]
    command: Command,

    #[arg(long, short, action = clap::ArgAction::Count, help = "Output v(v...)erbosity: error (0), warn (1), info (2), debug (3), trace (4)", global = true, default_value_t = 2)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl seed URLs, extract events with an LLM model and save them to the database
    Crawl {
        /// Path to database file to store events
        db: String,
        /// Seed URLs to crawl, in order
        seeds: Vec<String>,
        /// File with one seed URL per line ('#' starts a comment)
        #[arg(long, short = 'f')]
        seeds_file: Option<String>,
        /// URL of the LLM model to use for extraction
        #[arg(long, short, default_value = DEFAULT_MODEL)]
        model: String,
        /// Maximum link depth followed from each seed
        #[arg(long, default_value_t = 2)]
        depth: usize,
        /// Maximum number of pages fetched per seed
        #[arg(long, default_value_t = 50)]
        max_pages: u32,
        /// Delay between requests in milliseconds (rate limiting)
        #[arg(long, short, default_value_t = 0)]
        delay: u64,
        /// Text extraction method: "dom_smoothie" (default) or "fast_html2md"
        #[arg(long, default_value = "dom_smoothie")]
        text_by: TextBy,
        /// CSS selector to limit the HTML subset from which content is extracted (optional)
        #[arg(long, short)]
        selector: Option<String>,
        /// Rate limit: LLM requests per minute (default: no limit)
        #[arg(long, short = 'r')]
        rpm: Option<u32>,
        /// Only crawl when the database holds no events yet
        #[arg(long)]
        if_empty: bool,
    },
    /// Answer a question about the stored events using an LLM model
    Ask {
        /// Path to database file to read events from
        db: String,
        /// The question to answer
        question: String,
        /// URL of the LLM model to use for answering
        #[arg(long, short, default_value = DEFAULT_MODEL)]
        model: String,
        /// Rate limit: LLM requests per minute (default: no limit)
        #[arg(long, short = 'r')]
        rpm: Option<u32>,
    },
    /// Print the stored events ordered by date
    List {
        /// Path to database file to read events from
        db: String,
    },
    /// Delete all stored events
    Clear {
        /// Path to database file to clear
        db: String,
    },
}

struct CrawlArgs {
    db: String,
    seeds: Vec<String>,
    model: String,
    settings: CrawlSettings,
    rpm: Option<u32>,
    if_empty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    Builder::new()
        .filter_level(match cli.verbose {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .init();

    match cli.command {
        Command::Crawl {
            db,
            mut seeds,
            seeds_file,
            model,
            depth,
            max_pages,
            delay,
            text_by,
            selector,
            rpm,
            if_empty,
        } => {
            if let Some(file) = seeds_file {
                seeds.extend(read_seeds_file(&file)?);
            }
            let settings = CrawlSettings {
                max_depth: depth,
                max_pages,
                delay,
                text_by,
                selector: parse_selector(selector)?,
                ..CrawlSettings::default()
            };

            handle_crawl_command(CrawlArgs {
                db,
                seeds,
                model,
                settings,
                rpm,
                if_empty,
            })
            .await
        }
        Command::Ask {
            db,
            question,
            model,
            rpm,
        } => handle_ask_command(db, question, model, rpm).await,
        Command::List { db } => {
            let storage = Storage::new(&db)?;
            println!("{}", render_events(&storage.load_events()?));
            Ok(())
        }
        Command::Clear { db } => {
            let storage = Storage::new(&db)?;
            storage.clear_events()?;
            Ok(())
        }
    }
}

async fn handle_crawl_command(args: CrawlArgs) -> Result<()> {
    anyhow::ensure!(!args.seeds.is_empty(), "Specify at least one seed URL.");

    let storage = Storage::new(&args.db)?;
    let extractor = model_builder(&args.model)?
        .system(EXTRACTION_SYSTEM_PROMPT)
        .temperature(EXTRACTION_TEMPERATURE)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build LLM model: {}", e))?;
    let limiter = args.rpm.and_then(rate_limiter);
    let crawler = SpiderCrawler::new(args.settings);

    let ctx = CrawlContext {
        crawler: &crawler,
        extractor: ChatContext {
            model: extractor.as_ref(),
            rate_limiter: limiter.as_ref(),
        },
        storage: &storage,
    };

    let summary = if args.if_empty {
        crawl_if_empty(&ctx, &args.seeds).await?
    } else {
        Some(crawl_all(&ctx, &args.seeds).await?)
    };

    match summary {
        Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
        None => info!("Crawl skipped"),
    }

    Ok(())
}

async fn handle_ask_command(
    db: String,
    question: String,
    model: String,
    rpm: Option<u32>,
) -> Result<()> {
    let storage = Storage::new(&db)?;
    let assistant = model_builder(&model)?
        .system(ASSISTANT_SYSTEM_PROMPT)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build LLM model: {}", e))?;

    let limiter = rpm.and_then(rate_limiter);

    let ctx = ChatContext {
        model: assistant.as_ref(),
        rate_limiter: limiter.as_ref(),
    };
    let reply = answer_query(&ctx, &question, &storage.load_events()?).await?;
    println!("{reply}");

    Ok(())
}

fn parse_selector(selector_query: Option<String>) -> Result<Option<ScraperSelector>> {
    selector_query
        .map(|selector_query| {
            ScraperSelector::parse(&selector_query)
                .map_err(|e| anyhow::anyhow!("Invalid CSS selector: {}", e))
        })
        .transpose()
}
