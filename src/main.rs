use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing::info;
use uuid::Uuid;

use framequery::connector::{Connector, CsvConnector, JsonConnector, SourceFile};
use framequery::engine::{PolarsEngine, QueryEngine};
use framequery::storage::CacheIndex;
use framequery::{logging, FrameLoader, FrameQueryConfig, QueryBuilder};

const USAGE: &str = "usage: framequery [--save] <file.csv|file.json> [SQL...]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = FrameQueryConfig::load()?;
    logging::init(&cfg.log_filter);

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let save = match args.iter().position(|a| a == "--save") {
        Some(i) => { args.remove(i); true }
        None => false,
    };
    if args.is_empty() {
        return Err(anyhow!(USAGE));
    }
    let path = args.remove(0);
    let queries = if args.is_empty() { vec!["SELECT * FROM \"data\" LIMIT 10".to_string()] } else { args };

    let storage = cfg.open_storage()?;
    let connectors: Vec<Arc<dyn Connector>> =
        vec![Arc::new(CsvConnector::new(storage.clone())), Arc::new(JsonConnector::new(storage.clone()))];

    let bytes = tokio::fs::read(&path).await.with_context(|| format!("reading {}", path))?;
    let file = SourceFile::new(path.clone(), bytes);
    let ext = file.extension().unwrap_or_default();
    let connector = connectors
        .iter()
        .find(|c| c.info().extensions.iter().any(|e| *e == ext))
        .ok_or_else(|| anyhow!("no connector accepts .{} files", ext))?;
    let source = connector
        .as_file_source()
        .ok_or_else(|| anyhow!("connector '{}' cannot import files", connector.info().id))?;
    let parsed = source.parse(&file, Uuid::new_v4(), None).await?;
    info!(target: "framequery", "imported {}: rows={} cols={} frame={}", path, parsed.row_count, parsed.column_count, parsed.data_frame.id());

    let engine = Arc::new(PolarsEngine::new(storage.clone()));
    engine.initialize().await?;
    let loader = FrameLoader::new(engine.clone(), CacheIndex::new());
    let loaded = loader.ensure_loaded(&parsed.data_frame).await?;
    let bytes = parsed.data_frame.load_bytes(storage.as_ref()).await?;
    engine.register_arrow_table("data", &bytes).await?;
    info!(target: "framequery", "frame registered as '{}' and 'data'", loaded.table_name);

    if queries.len() > 1 && cfg.batch_queries {
        let results = QueryBuilder::batch_query(engine.as_ref(), &queries).await?;
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for sql in &queries {
            let result = engine.query(sql).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    if save {
        let saved = QueryBuilder::new(engine.clone(), parsed.data_frame.clone(), loaded.table_name.clone())
            .with_export_file(cfg.export_file.clone())
            .run(storage.as_ref())
            .await?;
        info!(target: "framequery", "saved copy of {} as frame {}", path, saved.id());
        println!("{}", saved.to_json_string()?);
    }
    engine.dispose().await?;
    Ok(())
}
