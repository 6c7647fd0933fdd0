use carlot::admin::AdminPanel;
use carlot::auth::{LocalIdentity, hash_password};
use carlot::config::{self, CarlotConfig};
use carlot::imaging::RustBackend;
use carlot::intake::{self, Intake};
use carlot::listing::filter_listings;
use carlot::store::{DocumentStore, MemoryStore};
use carlot::{export, output, storefront};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "carlot")]
#[command(about = "Used-car storefront: listings, image intake and a static storefront page")]
#[command(long_about = "\
Used-car storefront: listings, image intake and a static storefront page

Listings live in a JSON document store next to the config file. Uploaded
photos are scaled to fit 800×600, re-encoded as JPEG and stored inline with
the listing.

Administrators are configured in carlot.toml:

  [[admin.accounts]]
  email = \"admin@example.com\"
  password_sha256 = \"...\"     # carlot hash-password <email> <password>

Run 'carlot gen-config' to generate a documented carlot.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Administrator credentials for commands that change listings.
#[derive(clap::Args)]
struct Credentials {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

/// Listing fields as typed into the form.
#[derive(clap::Args)]
struct ListingArgs {
    #[arg(long)]
    make: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    year: Option<String>,
    #[arg(long)]
    price: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Image files or directories, in display order
    images: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the image intake pipeline on files and directories
    Compress {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Write the staged data URLs as a JSON array
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print listings, newest model year first
    List {
        /// Filter by make, model, description or year
        #[arg(long)]
        search: Option<String>,
    },
    /// Add a listing
    Add {
        #[command(flatten)]
        credentials: Credentials,
        #[command(flatten)]
        listing: ListingArgs,
    },
    /// Edit a listing; images are replaced only when given
    Update {
        id: String,
        #[command(flatten)]
        credentials: Credentials,
        #[command(flatten)]
        listing: ListingArgs,
    },
    /// Delete a listing
    Delete {
        id: String,
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Export all listings as CSV
    Export {
        #[arg(long, default_value = export::DEFAULT_EXPORT_FILE)]
        output: PathBuf,
    },
    /// Render the static storefront page
    Render {
        #[arg(long, default_value = "dist/index.html")]
        output: PathBuf,
        /// Pre-fill the search box and filter the page
        #[arg(long)]
        search: Option<String>,
    },
    /// Print the password digest for an [[admin.accounts]] entry
    HashPassword { email: String, password: String },
    /// Print a stock carlot.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Compress { paths, output } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let files = intake::collect_files(&paths)?;

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_intake_event(&event);
                }
            });
            let mut staged = Intake::new();
            let report = staged.process_files(
                &RustBackend::new(),
                &files,
                &config.compress_params(),
                Some(&tx),
            )?;
            drop(tx);
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            output::print_intake_summary(&report);

            if let Some(path) = output {
                let json = serde_json::to_string_pretty(staged.images())?;
                std::fs::write(&path, json)?;
                println!("Wrote {}", path.display());
            }
        }
        Command::List { search } => {
            let config = config::load_config(&cli.config)?;
            let store = open_store(&config, &cli.config)?;
            let listings = storefront::listings_from_documents(store.list(&config.collection())?);
            let term = search.unwrap_or_default();
            let shown: Vec<_> = filter_listings(&listings, &term)
                .into_iter()
                .cloned()
                .collect();
            output::print_listings(&shown);
        }
        Command::Add {
            credentials,
            listing,
        } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let mut panel = admin_panel(&config, &cli.config)?;
            panel.login(&credentials.email, &credentials.password)?;
            stage_listing(&mut panel, listing)?;
            let id = panel.submit()?;
            print_notice(&panel);
            println!("ID: {id}");
        }
        Command::Update {
            id,
            credentials,
            listing,
        } => {
            let config = config::load_config(&cli.config)?;
            init_thread_pool(&config.processing);
            let mut panel = admin_panel(&config, &cli.config)?;
            panel.login(&credentials.email, &credentials.password)?;
            panel.edit(&id)?;
            if !listing.images.is_empty() {
                panel.intake_mut().clear();
            }
            stage_listing(&mut panel, listing)?;
            panel.submit()?;
            print_notice(&panel);
        }
        Command::Delete { id, credentials } => {
            let config = config::load_config(&cli.config)?;
            let mut panel = admin_panel(&config, &cli.config)?;
            panel.login(&credentials.email, &credentials.password)?;
            panel.request_delete(&id);
            panel.confirm()?;
            print_notice(&panel);
        }
        Command::Export { output } => {
            let config = config::load_config(&cli.config)?;
            let store = open_store(&config, &cli.config)?;
            let listings = storefront::listings_from_documents(store.list(&config.collection())?);
            export::write_csv(&output, &listings)?;
            println!("Exported {} listings → {}", listings.len(), output.display());
        }
        Command::Render { output, search } => {
            let config = config::load_config(&cli.config)?;
            let store = open_store(&config, &cli.config)?;
            let listings = storefront::listings_from_documents(store.list(&config.collection())?);
            let page =
                storefront::render_storefront(&config.storefront.title, &listings, search.as_deref());
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&output, page.into_string())?;
            println!("Storefront → {}", output.display());
        }
        Command::HashPassword { email, password } => {
            println!("{}", hash_password(&email, &password));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

fn open_store(config: &CarlotConfig, config_path: &Path) -> Result<MemoryStore, Box<dyn std::error::Error>> {
    Ok(match config.store_path(config_dir(config_path)) {
        Some(path) => MemoryStore::open(&path)?,
        None => MemoryStore::new(),
    })
}

fn admin_panel(config: &CarlotConfig, config_path: &Path) -> Result<AdminPanel, Box<dyn std::error::Error>> {
    let store = Arc::new(open_store(config, config_path)?);
    let identity = Arc::new(LocalIdentity::new(config.admin.accounts.clone()));
    Ok(AdminPanel::new(
        identity,
        store,
        config.collection(),
        config.compress_params(),
    ))
}

/// Copy given fields into the form and stage any images.
fn stage_listing(panel: &mut AdminPanel, listing: ListingArgs) -> Result<(), Box<dyn std::error::Error>> {
    let draft = panel.draft_mut();
    let fields = [
        (&mut draft.make, listing.make),
        (&mut draft.model, listing.model),
        (&mut draft.year, listing.year),
        (&mut draft.price, listing.price),
        (&mut draft.description, listing.description),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            *field = value;
        }
    }

    if !listing.images.is_empty() {
        let files = intake::collect_files(&listing.images)?;
        let report = panel.add_images(&RustBackend::new(), &files)?;
        for failure in &report.failures {
            eprintln!("{}: {}", failure.name, failure.error);
        }
        output::print_intake_summary(&report);
    }
    Ok(())
}

fn print_notice(panel: &AdminPanel) {
    if let Some(notice) = panel.notice() {
        println!("{}", notice.text);
    }
}
