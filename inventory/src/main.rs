use anyhow::anyhow;
use clap::{Parser, Subcommand};
use inventory::hyperspace::err::InvErr;
use inventory::hyperspace::registry::kinds::{
    Environments, MetricTypes, Metrics, ResourceTypes, Resources,
};
use inventory::hyperspace::registry::Inventory;
use inventory::space::entity::{
    EnvironmentBlueprint, MetricBlueprint, MetricTypeBlueprint, ResourceBlueprint,
    ResourceTypeBlueprint, TenantBlueprint,
};
use inventory::space::err::SpaceErr;
use inventory::space::kind::{MetricDataType, MetricUnit, SegmentType};
use inventory::space::point::CanonicalPath;
use inventory::space::traversal;
use inventory::InventoryConfig;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::runtime::Builder;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "inventory graph tools")]
struct Cli {
    /// yaml configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// resolve a possibly relative, possibly untyped path to its canonical form
    Path {
        text: String,
        #[arg(long)]
        origin: Option<String>,
        #[arg(long = "type")]
        segment_type: Option<String>,
    },
    /// compile a traversal and print the query it becomes
    Traverse {
        text: String,
        #[arg(long)]
        tenant: Option<String>,
    },
    /// build a small inventory in memory and run a traversal against it
    Demo {
        #[arg(default_value = "tenants/acme/environments/prod/resources")]
        traversal: String,
    },
}

pub fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => InventoryConfig::load(path)?,
        None => InventoryConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log)),
        )
        .init();

    match cli.command {
        Commands::Path {
            text,
            origin,
            segment_type,
        } => {
            let origin = origin
                .map(|origin| CanonicalPath::from_str(&origin))
                .transpose()
                .map_err(report)?;
            let expected = segment_type
                .map(|t| SegmentType::parse_any(&t))
                .transpose()
                .map_err(report)?;
            let path =
                CanonicalPath::from_partially_untyped_string(&text, origin.as_ref(), expected)
                    .map_err(report)?;
            println!("{}", path);
            Ok(())
        }
        Commands::Traverse { text, tenant } => {
            let origin = tenant.map(CanonicalPath::tenant);
            let query = traversal::compile(&text, origin.as_ref()).map_err(report)?;
            println!("{}", query);
            Ok(())
        }
        Commands::Demo { traversal } => {
            let runtime = Builder::new_multi_thread().enable_all().build()?;
            runtime
                .block_on(async move { demo(config, &traversal).await })
                .map_err(|err| {
                    err.print();
                    anyhow!("demo failed")
                })
        }
    }
}

fn report(err: SpaceErr) -> anyhow::Error {
    err.print();
    anyhow!("{}", err)
}

async fn demo(config: InventoryConfig, text: &str) -> Result<(), InvErr> {
    let inventory = Inventory::memory(config);
    let acme = inventory.tenants().create(&TenantBlueprint::new("acme")).await?;

    acme.contained::<MetricTypes>()?
        .create(&MetricTypeBlueprint::new(
            "latency",
            MetricUnit::Milliseconds,
            MetricDataType::Gauge,
        ))
        .await?;
    let mut host = ResourceTypeBlueprint::new("host");
    host.metric_types.push("latency".to_string());
    acme.contained::<ResourceTypes>()?.create(&host).await?;

    let prod = acme
        .contained::<Environments>()?
        .create(&EnvironmentBlueprint::new("prod"))
        .await?;
    for id in ["web1", "web2", "db1"] {
        let resource = prod
            .contained::<Resources>()?
            .create(&ResourceBlueprint::new(id, "/t;acme/rt;host"))
            .await?;
        resource
            .contained::<Metrics>()?
            .create(&MetricBlueprint::new("latency", "/t;acme/mt;latency"))
            .await?;
    }

    let found = inventory.traverse(text, Some(acme.path()))?;
    let page = found.entities(&inventory.default_pager()).await?;
    for element in &page.items {
        println!("{}", element.path());
    }
    println!("{} of {}", page.items.len(), page.total_size);
    Ok(())
}
