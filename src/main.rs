use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use fielddispatch::config::DispatchConfig;
use fielddispatch::ranking::{JobProfile, PriorityRule, RankingCalculator, UrgencyLevel};
use fielddispatch::storage;

#[derive(Parser)]
#[command(
    name = "fielddispatch",
    about = "Dispatch engine for dealership field-service jobs",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + dispatch queue)
    Serve {
        /// Bind address (defaults to the configured server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Rank a job against the stored priority rules and print the result
    Rank {
        /// Dealership the job belongs to
        #[arg(long)]
        dealership: String,

        /// Service the job requests
        #[arg(long)]
        service: String,

        /// Input urgency: low, medium, high, or critical
        #[arg(long)]
        urgency: UrgencyLevel,

        /// Vehicle make, if known
        #[arg(long)]
        make: Option<String>,
    },

    /// Manage dealership priority rules
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// List rules, optionally for one dealership
    List {
        /// Restrict the listing to one dealership
        #[arg(long)]
        dealership: Option<String>,
    },

    /// Add a new rule
    Add {
        /// Dealership the rule is scoped to
        #[arg(long)]
        dealership: String,

        /// Only match jobs for this service
        #[arg(long)]
        service: Option<String>,

        /// Only match jobs with this vehicle make (case-sensitive)
        #[arg(long)]
        make: Option<String>,

        /// Only match jobs entering at this urgency
        #[arg(long)]
        urgency: Option<UrgencyLevel>,

        /// Urgency to escalate matched jobs to
        #[arg(long)]
        target: UrgencyLevel,

        /// Score delta added to matched jobs
        #[arg(long, default_value = "0")]
        score: i64,

        /// Human-readable description (shows up in ranking audit trails)
        #[arg(long)]
        description: String,
    },

    /// Remove a rule by id
    Remove {
        #[arg(long)]
        id: Uuid,
    },

    /// Disable a rule without deleting it
    Disable {
        #[arg(long)]
        id: Uuid,
    },

    /// Re-enable a disabled rule
    Enable {
        #[arg(long)]
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = DispatchConfig::load_or_default();

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let db_path = config.server.db_path.clone();
            tracing::info!(%bind, "Starting FieldDispatch daemon");
            fielddispatch::serve(&bind, &db_path, config).await?;
        }
        Commands::Rank {
            dealership,
            service,
            urgency,
            make,
        } => {
            let pool = storage::open_pool(&config.server.db_path)?;
            let rules = storage::list_rules(&pool, Some(&dealership))?;
            let calculator = RankingCalculator::new(config.ranking);

            let profile = JobProfile {
                dealership_id: dealership,
                service_id: service,
                urgency,
                vehicle_make: make,
            };
            profile.validate()?;
            let result = calculator.rank(&profile, &rules);

            println!("\n=== FieldDispatch Ranking ===");
            println!("Score:         {}", result.score);
            println!("Input urgency: {}", profile.urgency);
            println!("Final urgency: {}", result.final_urgency);
            if result.applied_rules.is_empty() {
                println!("Applied rules: (none)");
            } else {
                println!("Applied rules:");
                for rule in &result.applied_rules {
                    println!(" - {}", rule);
                }
            }
            println!("=============================\n");
        }
        Commands::Rules { action } => {
            let pool = storage::open_pool(&config.server.db_path)?;

            match action {
                RulesAction::List { dealership } => {
                    let rules = storage::list_rules(&pool, dealership.as_deref())?;
                    if rules.is_empty() {
                        println!("No rules found.");
                    } else {
                        println!(
                            "{:<36} | {:<12} | {:<8} | {:>5} | {:<7} | Description",
                            "ID", "Dealership", "Target", "Score", "Active"
                        );
                        println!(
                            "{:-<36}-|-{:-<12}-|-{:-<8}-|-{:-<5}-|-{:-<7}-|-{:-<30}",
                            "", "", "", "", "", ""
                        );
                        for rule in rules {
                            println!(
                                "{:<36} | {:<12} | {:<8} | {:>5} | {:<7} | {}",
                                rule.id,
                                rule.dealership_id,
                                rule.target_urgency,
                                rule.ranking_score,
                                rule.is_active,
                                rule.description
                            );
                        }
                    }
                }
                RulesAction::Add {
                    dealership,
                    service,
                    make,
                    urgency,
                    target,
                    score,
                    description,
                } => {
                    let now = chrono::Utc::now();
                    let rule = PriorityRule {
                        id: Uuid::new_v4(),
                        dealership_id: dealership,
                        service_id: service,
                        vehicle_make: make,
                        urgency_match: urgency,
                        target_urgency: target,
                        ranking_score: score,
                        is_active: true,
                        description,
                        created_at: now,
                        updated_at: now,
                    };
                    rule.validate()?;
                    storage::insert_rule(&pool, &rule)?;
                    println!("Rule '{}' added with id {}.", rule.description, rule.id);
                }
                RulesAction::Remove { id } => {
                    if storage::delete_rule(&pool, id)? {
                        println!("Rule {} removed.", id);
                    } else {
                        println!("No rule with id {}.", id);
                    }
                }
                RulesAction::Disable { id } => {
                    if storage::set_rule_active(&pool, id, false)? {
                        println!("Rule {} disabled.", id);
                    } else {
                        println!("No rule with id {}.", id);
                    }
                }
                RulesAction::Enable { id } => {
                    if storage::set_rule_active(&pool, id, true)? {
                        println!("Rule {} enabled.", id);
                    } else {
                        println!("No rule with id {}.", id);
                    }
                }
            }
        }
    }

    Ok(())
}
