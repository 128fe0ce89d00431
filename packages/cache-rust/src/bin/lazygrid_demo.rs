//! Scrolls a virtualized view over a generated in-memory tour table and
//! prints what the cache did.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use lazygrid_cache::{CacheConfig, CacheEvent, SqliteExecutor, SqliteSchema, VirtualRowProvider};
use lazygrid_core::{PageState, RowId, SortField, SortSpec};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lazygrid-demo", about = "Virtualized row cache demo over SQLite")]
struct Args {
    /// Number of generated tours.
    #[arg(long, default_value_t = 25_000, env = "LAZYGRID_TOURS")]
    tours: i64,

    /// Rows per page fetch.
    #[arg(long, default_value_t = 1000, env = "LAZYGRID_PAGE_SIZE")]
    page_size: usize,

    /// Sort field id, e.g. TIME_DATE or TOUR_TITLE.
    #[arg(long, default_value = "TIME_DATE")]
    sort: String,

    /// Sort descending instead of ascending.
    #[arg(long)]
    descending: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lazygrid_cache=info,warn")),
        )
        .init();

    let args = Args::parse();
    let executor = seed(args.tours)?;
    let config = CacheConfig {
        page_size: args.page_size,
        ..CacheConfig::default()
    };
    let mut provider = VirtualRowProvider::new(Arc::new(executor), config);
    let mut events = provider.subscribe();

    let field = if args.descending {
        SortField::descending(args.sort.as_str())
    } else {
        SortField::ascending(args.sort.as_str())
    };
    provider.set_sort(SortSpec::new(vec![field]));

    provider.row_count();
    wait_for(&mut events, |e| matches!(e, CacheEvent::CountChanged { .. })).await?;
    let count = provider.row_count();
    println!("rows: {count}");

    // Scroll to a few places, the way a user dragging the scrollbar would.
    for position in [0, count / 4, count / 2, count.saturating_sub(1)] {
        while provider.row_at(position).is_none()
            && provider.page_state(position) != PageState::Fetched
        {
            wait_for(&mut events, |e| matches!(e, CacheEvent::DataChanged { .. })).await?;
        }
        match provider.row_at(position) {
            Some(row) => println!("#{position}: tour {} {:?}", row.id, row.value("TourTitle")),
            None => println!("#{position}: <empty>"),
        }
    }

    // Keep the middle row selected across a sort flip.
    let selected = provider.id_at(count / 2);
    let flipped = if args.descending {
        SortField::ascending(args.sort.as_str())
    } else {
        SortField::descending(args.sort.as_str())
    };
    provider.set_sort(SortSpec::new(vec![flipped]));
    if let Some(id) = selected {
        let positions = provider.resolve_positions(vec![id]).await?;
        println!("selected tour {id} moved from #{} to {positions:?}", count / 2);
    }

    let wanted = vec![RowId(1), RowId(args.tours)];
    let positions = provider.resolve_positions(wanted.clone()).await?;
    println!("positions of {wanted:?}: {positions:?}");

    println!("{:#?}", provider.stats());
    provider.shutdown().await;
    Ok(())
}

fn seed(tours: i64) -> Result<SqliteExecutor> {
    let executor = SqliteExecutor::open_in_memory(SqliteSchema::default())?;
    executor.with_connection(|conn| {
        conn.execute_batch(
            "CREATE TABLE TourData (
                TourId INTEGER PRIMARY KEY,
                TourStartTime INTEGER NOT NULL,
                TourTitle TEXT,
                tourDistance REAL,
                tourDeviceTime_Recorded INTEGER,
                tourType_typeId INTEGER
            );
            CREATE TABLE TourData_TourTag (TourData_tourId INTEGER, TourTag_tagId INTEGER);
            CREATE TABLE TourMarker (markerId INTEGER PRIMARY KEY, TourData_tourId INTEGER);",
        )?;
        let tx = conn.transaction()?;
        {
            let mut insert = tx.prepare("INSERT INTO TourData VALUES (?1, ?2, ?3, ?4, ?5, ?6)")?;
            let mut tag = tx.prepare("INSERT INTO TourData_TourTag VALUES (?1, ?2)")?;
            for id in 1..=tours {
                // Start times are shuffled so the sort order differs from id order.
                let start = (id * 7919) % (tours * 10) * 3600;
                insert.execute(rusqlite_params(id, start))?;
                if id % 5 == 0 {
                    tag.execute([id, id % 3])?;
                }
            }
        }
        tx.commit()
    })?;
    Ok(executor)
}

fn rusqlite_params(id: i64, start: i64) -> [rusqlite::types::Value; 6] {
    use rusqlite::types::Value;
    [
        Value::Integer(id),
        Value::Integer(start),
        Value::Text(format!("Tour {id}")),
        Value::Real((id % 100) as f64 * 1000.0),
        Value::Integer(id % 7 * 600),
        Value::Integer(id % 4),
    ]
}

async fn wait_for(
    events: &mut broadcast::Receiver<CacheEvent>,
    wanted: impl Fn(&CacheEvent) -> bool,
) -> Result<()> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if wanted(&event) => return Ok(()),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => bail!("event channel closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(30), wait).await?
}
