use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use ranking::{RequestContext, Season, TimeOfDay, TimeWindow};
use server::{
    Algorithm, RecommendationOrchestrator, RecommendationRequest, RecommendationResponse,
    RecommendedItem,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use store::{demo, DataStore};

/// SokoRecs - Product recommendations for Kenyan e-commerce
#[derive(Parser)]
#[command(name = "soko-recs")]
#[command(about = "Product recommendation engine with collaborative, latent-factor, and hybrid models", long_about = None)]
struct Cli {
    /// Path to the dataset file (catalog + interaction log)
    #[arg(short, long, default_value = "data/dataset.json")]
    data_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get personalized recommendations for a user
    Recommend {
        /// User ID to get recommendations for
        #[arg(long)]
        user_id: String,

        /// Algorithm: user_based | hybrid | matrix_factorization | trending | context_aware
        #[arg(long, default_value = "user_based")]
        algorithm: Algorithm,

        /// Number of recommendations to return
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Request county, for local boosts (e.g. Nairobi)
        #[arg(long)]
        county: Option<String>,

        /// Time of day: morning | afternoon | evening | night
        #[arg(long)]
        time_of_day: Option<String>,

        /// Apply the festive-season boost
        #[arg(long)]
        festive: bool,

        /// Apply the rainy-season boost
        #[arg(long)]
        rainy: bool,
    },

    /// Find products similar to a given product
    Similar {
        /// Product ID to find neighbors for
        #[arg(long)]
        product_id: String,

        /// Number of similar products to return
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Recommend products to go with a basket
    Basket {
        /// Product IDs already in the basket (repeatable)
        #[arg(long, required = true)]
        product_id: Vec<String>,

        /// Number of recommendations to return
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Show trending products
    Trending {
        /// Window: 1h | 24h | 7d | 30d
        #[arg(long, default_value = "24h")]
        window: String,

        /// Restrict to interactions from one county
        #[arg(long)]
        county: Option<String>,

        /// Restrict to products in one category
        #[arg(long)]
        category: Option<String>,

        /// Number of products to return
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Generate a synthetic demo dataset
    Generate {
        /// Number of users
        #[arg(long, default_value = "200")]
        users: usize,

        /// Number of products
        #[arg(long, default_value = "60")]
        products: usize,

        /// Number of interactions
        #[arg(long, default_value = "8000")]
        interactions: usize,

        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Show dataset statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Generate doesn't need an existing dataset.
    if let Commands::Generate {
        users,
        products,
        interactions,
        seed,
    } = &cli.command
    {
        return handle_generate(&cli.data_file, *users, *products, *interactions, *seed);
    }

    println!("Loading dataset from {}...", cli.data_file.display());
    let start = Instant::now();
    let store = Arc::new(
        DataStore::load_from_file(&cli.data_file).context("Failed to load dataset")?,
    );
    store.validate().context("Dataset failed validation")?;
    println!("{} Loaded dataset in {:?}", "✓".green(), start.elapsed());

    match cli.command {
        Commands::Recommend {
            user_id,
            algorithm,
            limit,
            county,
            time_of_day,
            festive,
            rainy,
        } => {
            let ctx = build_context(county, time_of_day, festive, rainy)?;
            handle_recommend(store, user_id, algorithm, limit, ctx).await?
        }
        Commands::Similar { product_id, limit } => {
            handle_similar(store, product_id, limit).await?
        }
        Commands::Basket { product_id, limit } => handle_basket(store, product_id, limit).await?,
        Commands::Trending {
            window,
            county,
            category,
            limit,
        } => handle_trending(store, window, county, category, limit)?,
        Commands::Stats => handle_stats(store)?,
        Commands::Generate { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn build_context(
    county: Option<String>,
    time_of_day: Option<String>,
    festive: bool,
    rainy: bool,
) -> Result<Option<RequestContext>> {
    if county.is_none() && time_of_day.is_none() && !festive && !rainy {
        return Ok(None);
    }
    let mut ctx = RequestContext::new();
    if let Some(county) = county {
        ctx = ctx.with_county(county);
    }
    if let Some(time_of_day) = time_of_day {
        let time_of_day = match time_of_day.as_str() {
            "morning" => TimeOfDay::Morning,
            "afternoon" => TimeOfDay::Afternoon,
            "evening" => TimeOfDay::Evening,
            "night" => TimeOfDay::Night,
            other => return Err(anyhow!("Unknown time of day '{}'", other)),
        };
        ctx = ctx.with_time_of_day(time_of_day);
    }
    if festive {
        ctx = ctx.with_season(Season::Festive);
    } else if rainy {
        ctx = ctx.with_season(Season::Rainy);
    }
    Ok(Some(ctx))
}

async fn trained_orchestrator(store: Arc<DataStore>) -> Result<Arc<RecommendationOrchestrator>> {
    let orchestrator = Arc::new(RecommendationOrchestrator::new(store));
    println!("Training models...");
    let start = Instant::now();
    orchestrator
        .train_with_timeout()
        .await
        .context("Training failed")?;
    println!("{} Trained in {:?}", "✓".green(), start.elapsed());
    Ok(orchestrator)
}

/// Handle the 'recommend' command
async fn handle_recommend(
    store: Arc<DataStore>,
    user_id: String,
    algorithm: Algorithm,
    limit: usize,
    ctx: Option<RequestContext>,
) -> Result<()> {
    let orchestrator = trained_orchestrator(store.clone()).await?;
    let mut request = RecommendationRequest::for_user(&user_id, algorithm).with_n(limit);
    if let Some(ctx) = ctx {
        request = request.with_context(ctx);
    }
    let response = orchestrator.recommend(&request);

    println!(
        "{}",
        format!("Recommendations for {} ({}):", user_id, algorithm)
            .bold()
            .blue()
    );
    print_response(&store, &response);
    Ok(())
}

/// Handle the 'similar' command
async fn handle_similar(store: Arc<DataStore>, product_id: String, limit: usize) -> Result<()> {
    let orchestrator = trained_orchestrator(store.clone()).await?;
    let response = orchestrator.recommend(
        &RecommendationRequest::for_product(&product_id, Algorithm::ItemBased).with_n(limit),
    );

    let name = store
        .get_product(&product_id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| product_id.clone());
    println!("{}", format!("Products similar to {}:", name).bold().blue());
    print_response(&store, &response);
    Ok(())
}

/// Handle the 'basket' command
async fn handle_basket(store: Arc<DataStore>, basket: Vec<String>, limit: usize) -> Result<()> {
    let orchestrator = trained_orchestrator(store.clone()).await?;
    let response =
        orchestrator.recommend(&RecommendationRequest::for_basket(basket.clone()).with_n(limit));

    println!(
        "{}",
        format!("Goes well with your basket of {} item(s):", basket.len())
            .bold()
            .blue()
    );
    print_response(&store, &response);
    Ok(())
}

/// Handle the 'trending' command
fn handle_trending(
    store: Arc<DataStore>,
    window: String,
    county: Option<String>,
    category: Option<String>,
    limit: usize,
) -> Result<()> {
    let orchestrator = RecommendationOrchestrator::new(store.clone());
    let window = TimeWindow::parse(&window);
    let mut request = RecommendationRequest::trending()
        .with_n(limit)
        .with_window(window);
    if let Some(county) = county {
        request = request.with_county(county);
    }
    if let Some(category) = category {
        request = request.with_category(category);
    }
    let response = orchestrator.recommend(&request);

    println!(
        "{}",
        format!("Trending over the last {}:", window.as_str())
            .bold()
            .blue()
    );
    print_response(&store, &response);
    Ok(())
}

/// Handle the 'generate' command
fn handle_generate(
    data_file: &Path,
    users: usize,
    products: usize,
    interactions: usize,
    seed: u64,
) -> Result<()> {
    println!(
        "Generating {} users, {} products, {} interactions (seed {})...",
        users, products, interactions, seed
    );
    let dataset = demo::generate_dataset(users, products, interactions, seed);
    let store = DataStore::from_dataset(dataset);
    if let Some(parent) = data_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    store
        .save_to_file(data_file)
        .context("Failed to write dataset")?;
    println!("{} Wrote {}", "✓".green(), data_file.display());
    Ok(())
}

/// Handle the 'stats' command
fn handle_stats(store: Arc<DataStore>) -> Result<()> {
    let (products, users, interactions) = store.counts();
    println!("{}", "Dataset statistics:".bold().blue());
    println!("{}Products: {}", "• ".green(), products);
    println!("{}Users: {}", "• ".green(), users);
    println!("{}Interactions: {}", "• ".green(), interactions);

    let mut categories: Vec<(String, usize)> = store
        .products()
        .map(|p| p.category.clone())
        .fold(std::collections::HashMap::<String, usize>::new(), |mut acc, c| {
            *acc.entry(c).or_insert(0) += 1;
            acc
        })
        .into_iter()
        .collect();
    categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    println!("Products per category:");
    for (category, count) in categories {
        println!("  - {}: {}", category, count);
    }
    Ok(())
}

/// Format and print a response, enriched with catalog metadata where we
/// have it.
fn print_response(store: &DataStore, response: &RecommendationResponse) {
    if response.items.is_empty() {
        println!("{}", "No results.".yellow());
        return;
    }
    println!("{}", response.explanation.italic());
    for (i, item) in response.items.iter().enumerate() {
        print_item(store, i, item);
    }
}

fn print_item(store: &DataStore, i: usize, item: &RecommendedItem) {
    let rank = (i + 1).to_string().green();
    match store.get_product(&item.product_id) {
        Some(product) => println!(
            "{}. {} [{}] KES {:.0} - Score: {:.3} ({})",
            rank, product.name, product.category, product.price, item.score, item.algorithm
        ),
        None => println!(
            "{}. {} - Score: {:.3} ({})",
            rank, item.product_id, item.score, item.algorithm
        ),
    }
}
